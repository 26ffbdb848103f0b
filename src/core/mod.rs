//! Core engine modules - generations, loader pool, buffer, clock, events, controller
//!
//! These modules form the playback engine, independent of any UI or renderer.

pub mod buffer;
pub mod clock;
pub mod controller;
pub mod error;
pub mod event_bus;
pub mod generations;
pub mod loader_pool;
pub mod stats;
pub mod workers;

// Re-exports for convenience
pub use buffer::BufferManager;
pub use clock::{Crossing, PlaybackClock, PlaybackMode};
pub use controller::SequenceController;
pub use error::SequenceError;
pub use event_bus::{ControllerId, EventBus, EventInfo, SequenceEnded, SequenceLooped};
pub use generations::{GenerationRing, MAX_GENERATIONS};
pub use loader_pool::{LoadResult, LoaderPool, LoaderTask};
pub use stats::PlaybackStatus;
pub use workers::Workers;
