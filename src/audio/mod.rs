// Module audio - Engine handle and real-time block processing

pub mod engine;
pub mod parameters;
pub mod processor;
pub mod status;

pub use engine::Engine;
pub use processor::EngineProcessor;
pub use status::EngineStatus;
