// Atomic parameters - Lock-free communication control ↔ Audio thread
// Uses atomic operations to share values between threads without locks

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe f64 value using atomic operations
/// Converts f64 to u64 bits for atomic storage
#[derive(Debug, Clone)]
pub struct AtomicF64 {
    inner: Arc<AtomicU64>,
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self {
            inner: Arc::new(AtomicU64::new(value.to_bits())),
        }
    }

    /// Set the value (called from audio thread)
    pub fn set(&self, value: f64) {
        self.inner.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Get the value (called from control thread)
    pub fn get(&self) -> f64 {
        f64::from_bits(self.inner.load(Ordering::Relaxed))
    }
}

impl Default for AtomicF64 {
    fn default() -> Self {
        Self::new(0.0)
    }
}
