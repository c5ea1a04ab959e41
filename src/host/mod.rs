//! Host collaborators consumed by the exporter.
//!
//! The exporter never rasterizes anything itself. It drives a [`Document`]
//! (layer tree, timeline, renderer of the active document) and a [`Canvas`]
//! created by that document for the composed sheet.
//!
//! Rendering on a host is asynchronous relative to scripted commands: after
//! changing the current time or a layer's visibility the caller must call
//! [`Document::wait_for_pending_render`] before exporting the frame.
//!
//! # Backends
//!
//! - [`SceneDocument`] - file-based document described by a JSON scene
//!   manifest or built from a numbered image sequence
//! - [`ImageCanvas`] - RGBA8 canvas backed by the `image` crate

pub mod canvas;
pub mod scene;

#[cfg(test)]
pub(crate) mod fake;

pub use canvas::ImageCanvas;
pub use scene::{LayerSpec, SceneDocument, SceneManifest};

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::entities::layer::{LayerId, LayerNode};

/// Properties copied from the source document onto the sheet canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentInfo {
    pub width: u32,
    pub height: u32,
    pub color_model: String,
    pub color_depth: String,
    pub color_profile: String,
    /// Pixels per inch
    pub resolution: f64,
}

/// Collaborator failures
#[derive(Debug)]
pub enum HostError {
    Io { path: PathBuf, source: std::io::Error },
    Image { path: PathBuf, message: String },
    UnknownLayer(LayerId),
    UnknownHandle(Uuid),
    InvalidScene(String),
    /// Pixel buffer would not fit in memory addressing
    CanvasTooLarge { width: u32, height: u32 },
    /// Host declined the request in its current state
    Refused(String),
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostError::Io { path, source } => write!(f, "I/O error on {}: {}", path.display(), source),
            HostError::Image { path, message } => write!(f, "Image error on {}: {}", path.display(), message),
            HostError::UnknownLayer(id) => write!(f, "Unknown {}", id),
            HostError::UnknownHandle(handle) => write!(f, "Unknown canvas layer {}", handle),
            HostError::InvalidScene(msg) => write!(f, "Invalid scene: {}", msg),
            HostError::CanvasTooLarge { width, height } => write!(f, "Canvas {}x{} is too large", width, height),
            HostError::Refused(msg) => write!(f, "Refused: {}", msg),
        }
    }
}

impl std::error::Error for HostError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HostError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// The host's active document.
pub trait Document {
    type Canvas: Canvas;

    /// Snapshot of the layer tree.
    fn top_level_layers(&self) -> Vec<LayerNode>;

    fn has_keyframe_at(&self, layer: LayerId, time: i32) -> bool;

    /// Older hosts cannot answer per-time keyframe queries.
    fn supports_keyframe_queries(&self) -> bool {
        true
    }

    fn clip_range_end(&self) -> i32;

    fn current_time(&self) -> i32;

    fn set_current_time(&mut self, time: i32);

    fn set_layer_visible(&mut self, layer: LayerId, visible: bool) -> Result<(), HostError>;

    /// Block until the frame reflecting the latest changes is rendered.
    fn wait_for_pending_render(&mut self) -> Result<(), HostError>;

    fn export_current_frame(&mut self, path: &Path) -> Result<(), HostError>;

    fn info(&self) -> DocumentInfo;

    fn create_canvas(&self, width: u32, height: u32, name: &str, info: &DocumentInfo) -> Result<Self::Canvas, HostError>;
}

/// Output canvas the sheet is assembled on.
///
/// Inserted image layers are not part of the composed output until they are
/// merged down.
pub trait Canvas {
    fn insert_image_layer(&mut self, path: &Path) -> Result<Uuid, HostError>;

    fn move_layer(&mut self, layer: Uuid, x: u32, y: u32) -> Result<(), HostError>;

    fn merge_down(&mut self, layer: Uuid) -> Result<(), HostError>;

    fn export(&mut self, path: &Path) -> Result<(), HostError>;
}
