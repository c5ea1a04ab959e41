//! Utility modules

pub mod sequences;

pub use sequences::{SequenceFrame, detect_sequence};
