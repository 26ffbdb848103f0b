//! SEQPLAY - Image sequence playback library
//!
//! Plays a directory of still images as a video stream. Decode latency is hidden
//! behind a bounded look-ahead buffer filled by background workers.
//!
//! Re-exports all modules for use by the binary target.

// Core engine (generations, loader pool, buffer, clock, controller)
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod entities;
pub mod utils;

// Re-export commonly used types from core
pub use core::controller::SequenceController;
pub use core::error::SequenceError;
pub use core::event_bus::{EventBus, EventInfo, SequenceEnded, SequenceLooped};
pub use core::stats::PlaybackStatus;

// Re-export entities
pub use config::{DecodeMode, PlayerConfig};
pub use entities::{Decode, Decoder, FrameError, FramePayload, LoadState, Presenter, TextureHandle};
