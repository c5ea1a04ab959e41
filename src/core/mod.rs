//! Core engine modules - frame resolution, grid solving, placement, export
//!
//! These modules form the packing engine, independent of any particular host.

pub mod atlas;
pub mod error;
pub mod exporter;
pub mod grid;
pub mod guards;
pub mod placement;
pub mod progress;
pub mod resolver;

// Re-exports for convenience
pub use atlas::TextureAtlas;
pub use error::ExportError;
pub use exporter::{ExportOutcome, Exporter, export};
pub use grid::{GridGeometry, solve_grid};
pub use guards::{HostStateGuard, SpritesDir, resolve_destination};
pub use placement::{Placement, placement_for};
pub use progress::{CancelToken, ExportProgress, ExportStage};
pub use resolver::{TimelineRange, resolve_frames, resolve_timeline_range};
