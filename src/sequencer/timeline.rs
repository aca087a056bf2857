// Timeline - Tick time representation
// Handles conversion between samples, ticks and real time

use std::fmt;

use crate::error::{Result, SequencerError};

/// Global tempo in ticks per second
///
/// A tick is the finest addressable step in a pattern, so the tempo directly
/// sets how fast the playhead moves through pattern slots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    ticks_per_second: f64,
}

impl Tempo {
    /// Creates a new tempo, rejecting zero, negative and non-finite values
    pub fn new(ticks_per_second: f64) -> Result<Self> {
        if !ticks_per_second.is_finite() || ticks_per_second <= 0.0 {
            return Err(SequencerError::InvalidTempo(ticks_per_second));
        }
        Ok(Self { ticks_per_second })
    }

    pub fn ticks_per_second(&self) -> f64 {
        self.ticks_per_second
    }

    /// Duration of one tick in samples at given sample rate
    pub fn samples_per_tick(&self, sample_rate: f64) -> f64 {
        sample_rate / self.ticks_per_second
    }

    /// Number of (fractional) ticks spanned by `samples`
    pub fn ticks_for_samples(&self, samples: u64, sample_rate: f64) -> f64 {
        samples as f64 * self.ticks_per_second / sample_rate
    }

    /// Tempo scaled by a factor; falls back to `self` if the result is invalid
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.ticks_per_second * factor).unwrap_or(*self)
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            ticks_per_second: 4.0,
        }
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} ticks/s", self.ticks_per_second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_validation() {
        assert!(Tempo::new(4.0).is_ok());
        assert_eq!(Tempo::new(0.0), Err(SequencerError::InvalidTempo(0.0)));
        assert_eq!(Tempo::new(-1.0), Err(SequencerError::InvalidTempo(-1.0)));
        assert!(Tempo::new(f64::NAN).is_err());
        assert!(Tempo::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_sample_conversions() {
        let tempo = Tempo::new(4.0).unwrap();
        let sample_rate = 48000.0;

        // 4 ticks per second at 48kHz = 12000 samples per tick
        assert_eq!(tempo.samples_per_tick(sample_rate), 12000.0);
        assert_eq!(tempo.ticks_for_samples(24000, sample_rate), 2.0);
    }

    #[test]
    fn test_scaled() {
        let tempo = Tempo::new(4.0).unwrap();
        assert_eq!(tempo.scaled(2.0).ticks_per_second(), 8.0);
        // Invalid factor keeps the original tempo
        assert_eq!(tempo.scaled(0.0), tempo);
    }
}
