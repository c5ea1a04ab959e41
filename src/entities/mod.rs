//! Entities module - data model of an export
//!
//! - `job` - immutable export configuration
//! - `layer` - layer tree snapshot taken from the host
//! - `frame` - resolved frames and intermediate file naming
//! - `compositor` - CPU alpha blending used by the bundled host

pub mod compositor;
pub mod frame;
pub mod job;
pub mod layer;

pub use frame::{FrameDescriptor, FrameKey, FrameSet};
pub use job::{ExportJob, FillDirection, OverflowPolicy, OverwritePolicy, SourceMode};
pub use layer::{LayerId, LayerNode};
