//! Utility functions
//!
//! **Used by**: SequenceController (directory enumeration)

pub mod sequences;

pub use sequences::{has_extension, list_frames};
