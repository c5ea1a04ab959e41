//! Export errors.
//!
//! Every failure aborts the whole job; there is no partial retry. Cleanup of
//! resources the job created still runs (see `core::guards`).

use std::path::PathBuf;

use crate::entities::layer::LayerId;
use crate::host::HostError;

#[derive(Debug)]
pub enum ExportError {
    /// Resolver found nothing to export; raised before any I/O
    NoFramesFound,
    /// No free suffixed sprites directory within the probe limit
    DirectoryConflict { base: PathBuf, attempts: u32 },
    /// Host refused to hide a leaf before layer sampling
    LayerVisibility { layer: LayerId, source: HostError },
    /// Host refused or failed to export one frame
    FrameExportFailed {
        raw_index: i64,
        path: PathBuf,
        source: HostError,
    },
    /// Canvas creation, layer insertion/merge or final sheet export failed
    CompositionFailed {
        reason: String,
        source: Option<HostError>,
    },
    /// User grid cannot hold every frame and the job asked to reject that
    GridTooSmall { rows: u32, columns: u32, frames: usize },
    InvalidJob(String),
    Cancelled,
    Io { path: PathBuf, source: std::io::Error },
}

impl ExportError {
    pub(crate) fn composition(reason: impl Into<String>, source: HostError) -> Self {
        ExportError::CompositionFailed {
            reason: reason.into(),
            source: Some(source),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::Io {
            path: path.into(),
            source,
        }
    }
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::NoFramesFound => write!(f, "No frames found to export"),
            ExportError::DirectoryConflict { base, attempts } => write!(
                f,
                "No free sprites directory next to {} after {} attempts",
                base.display(),
                attempts
            ),
            ExportError::LayerVisibility { layer, source } => {
                write!(f, "Failed to hide {} before sampling: {}", layer, source)
            }
            ExportError::FrameExportFailed { raw_index, path, source } => write!(
                f,
                "Failed to export frame {} to {}: {}",
                raw_index,
                path.display(),
                source
            ),
            ExportError::CompositionFailed { reason, source } => match source {
                Some(e) => write!(f, "Composition failed: {}: {}", reason, e),
                None => write!(f, "Composition failed: {}", reason),
            },
            ExportError::GridTooSmall { rows, columns, frames } => write!(
                f,
                "Grid {}x{} holds {} cells but {} frames need a slot",
                columns,
                rows,
                (*rows as u64) * (*columns as u64),
                frames
            ),
            ExportError::InvalidJob(msg) => write!(f, "Invalid export job: {}", msg),
            ExportError::Cancelled => write!(f, "Export cancelled"),
            ExportError::Io { path, source } => write!(f, "I/O error on {}: {}", path.display(), source),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::LayerVisibility { source, .. } => Some(source),
            ExportError::FrameExportFailed { source, .. } => Some(source),
            ExportError::CompositionFailed { source: Some(e), .. } => Some(e),
            ExportError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
