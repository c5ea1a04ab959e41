//! Spritesheet exporter library
//!
//! Samples the frames of an animated document (timeline times or leaf
//! layers), packs them into a grid and writes one sheet image.

// Packing engine (resolver, grid, placement, orchestrator)
pub mod core;

pub mod cli;
pub mod config;
pub mod entities;
pub mod host;
pub mod utils;

pub use crate::core::{ExportError, ExportOutcome, Exporter, export};
pub use entities::{ExportJob, FillDirection, OverflowPolicy, OverwritePolicy, SourceMode};
pub use host::{Canvas, Document, SceneDocument};
