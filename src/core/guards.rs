//! Scoped resources of an export job.
//!
//! - [`HostStateGuard`] - restores layer visibility and current time of the
//!   document on drop (success, error, cancel or panic)
//! - [`SpritesDir`] - the intermediate frames directory; removes what this
//!   job wrote (and the directory, if this job created it) when the job does
//!   not finish normally

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use log::{debug, info, trace, warn};

use super::error::ExportError;
use crate::entities::frame::frame_file_path;
use crate::entities::job::{ExportJob, OverwritePolicy};
use crate::entities::layer::LayerId;
use crate::host::Document;

/// Upper bound on `<dir>N` candidates tried before giving up.
pub const MAX_SUFFIX_PROBES: u32 = 10_000;

/// RAII guard over the mutable state of the host document.
pub struct HostStateGuard<'d, D: Document> {
    doc: &'d mut D,
    time: i32,
    visibility: Vec<(LayerId, bool)>,
}

impl<'d, D: Document> HostStateGuard<'d, D> {
    /// Remember the current time and the given layer visibilities.
    pub fn capture(doc: &'d mut D, visibility: Vec<(LayerId, bool)>) -> Self {
        let time = doc.current_time();
        Self { doc, time, visibility }
    }
}

impl<D: Document> Deref for HostStateGuard<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        &*self.doc
    }
}

impl<D: Document> DerefMut for HostStateGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut *self.doc
    }
}

impl<D: Document> Drop for HostStateGuard<'_, D> {
    fn drop(&mut self) {
        for (layer, visible) in self.visibility.drain(..) {
            if let Err(e) = self.doc.set_layer_visible(layer, visible) {
                warn!("Failed to restore visibility of {}: {}", layer, e);
            }
        }
        if self.doc.current_time() != self.time {
            self.doc.set_current_time(self.time);
        }
    }
}

/// Pick the sprites directory for `job` without creating it.
///
/// With [`OverwritePolicy::AlwaysCreateNew`] an existing directory is never
/// reused: `<dir>0`, `<dir>1`, ... are probed until a free one is found.
pub fn resolve_destination(job: &ExportJob) -> Result<PathBuf, ExportError> {
    let requested = job.requested_sprites_dir();
    match job.overwrite_policy {
        OverwritePolicy::AlwaysCreateNew if requested.exists() => probe_free_dir(&requested, MAX_SUFFIX_PROBES),
        _ => Ok(requested),
    }
}

fn probe_free_dir(base: &Path, limit: u32) -> Result<PathBuf, ExportError> {
    let conflict = |attempts| ExportError::DirectoryConflict {
        base: base.to_path_buf(),
        attempts,
    };
    let parent = base.parent().unwrap_or_else(|| Path::new(""));
    let folder = base.file_name().ok_or_else(|| conflict(0))?.to_string_lossy();

    for n in 0..limit {
        let candidate = parent.join(format!("{}{}", folder, n));
        trace!("Probing sprites directory {}", candidate.display());
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(conflict(limit))
}

/// Directory holding the intermediate frame files of one job.
#[derive(Debug)]
pub struct SpritesDir {
    path: PathBuf,
    created: bool,
    written: Vec<PathBuf>,
    delete_intermediates: bool,
    released: bool,
}

impl SpritesDir {
    /// Resolve and, if needed, create the sprites directory.
    pub fn acquire(job: &ExportJob) -> Result<Self, ExportError> {
        let path = resolve_destination(job)?;
        let created = if path.is_dir() {
            debug!("Reusing sprites directory {}", path.display());
            false
        } else {
            std::fs::create_dir_all(&path).map_err(|e| ExportError::io(&path, e))?;
            info!("Created sprites directory {}", path.display());
            true
        };

        Ok(Self {
            path,
            created,
            written: Vec::new(),
            delete_intermediates: job.delete_intermediates,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this job created the directory.
    pub fn created(&self) -> bool {
        self.created
    }

    pub fn frame_path(&self, export_name: &str, raw_index: i64) -> PathBuf {
        frame_file_path(&self.path, export_name, raw_index)
    }

    /// Track a file written by this job.
    pub fn record(&mut self, path: PathBuf) {
        self.written.push(path);
    }

    /// Delete an intermediate file right away.
    pub fn remove_file(&mut self, path: &Path) -> Result<(), ExportError> {
        std::fs::remove_file(path).map_err(|e| ExportError::io(path, e))?;
        self.written.retain(|p| p != path);
        Ok(())
    }

    /// Normal end of the job.
    ///
    /// Removes the directory when intermediates are deleted and this job
    /// created it. A pre-existing directory is never removed.
    pub fn release(mut self) -> Result<(), ExportError> {
        self.released = true;
        if self.delete_intermediates && self.created {
            std::fs::remove_dir(&self.path).map_err(|e| ExportError::io(&self.path, e))?;
            debug!("Removed sprites directory {}", self.path.display());
        }
        Ok(())
    }
}

impl Drop for SpritesDir {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if self.delete_intermediates {
            for file in self.written.drain(..) {
                if let Err(e) = std::fs::remove_file(&file) {
                    warn!("Failed to remove {}: {}", file.display(), e);
                }
            }
        }
        // Only ever remove a directory this job created, and only when empty
        if self.delete_intermediates && self.created {
            match std::fs::remove_dir(&self.path) {
                Ok(()) => debug!("Removed sprites directory {} after failure", self.path.display()),
                Err(e) => warn!("Left sprites directory {}: {}", self.path.display(), e),
            }
        }
    }
}
