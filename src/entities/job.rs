//! Export job configuration.
//!
//! An [`ExportJob`] is an immutable value: build it, hand it to one
//! `Exporter::export()` call, drop it. Optional grid/range values are real
//! `Option`s, so `Some(0)` never means "unset" past the constructors.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::error::ExportError;

/// Order in which grid cells are filled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillDirection {
    /// Row-major: 1 2 3 / 4 5 6
    #[default]
    Horizontal,
    /// Column-major: 1 4 / 2 5 / 3 6
    Vertical,
}

/// What to do when the sprites directory already exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverwritePolicy {
    /// Write into the existing directory, possibly overwriting files
    #[default]
    ReuseExisting,
    /// Probe `<dir>0`, `<dir>1`, ... until a free name is found
    AlwaysCreateNew,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceMode {
    /// One frame per sampled timeline time
    #[default]
    TimelineFrames,
    /// One frame per visible leaf layer
    LayerFrames,
}

/// Behavior when user-set rows x columns cannot hold every frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Place what fits, drop trailing frames with a warning
    #[default]
    DropExcess,
    /// Fail with `GridTooSmall` before touching the file system
    Reject,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExportJob {
    pub export_name: String,
    pub export_dir: PathBuf,
    /// Explicit sprites directory; derived from name when `None`
    pub sprites_dir: Option<PathBuf>,
    pub fill_direction: FillDirection,
    pub rows: Option<u32>,
    pub columns: Option<u32>,
    pub frame_start: Option<i32>,
    pub frame_end: Option<i32>,
    /// 0 is treated as 1, see [`ExportJob::step`]
    pub frame_step: u32,
    pub overwrite_policy: OverwritePolicy,
    pub delete_intermediates: bool,
    pub source_mode: SourceMode,
    pub write_texture_atlas: bool,
    pub overflow_policy: OverflowPolicy,
}

impl ExportJob {
    pub const DEFAULT_NAME: &'static str = "Spritesheet";

    /// New job with default settings.
    ///
    /// The name is cut at the first `.` so `"hero.png"` exports as `hero`.
    pub fn new(export_name: &str, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_name: sanitize_export_name(export_name),
            export_dir: export_dir.into(),
            sprites_dir: None,
            fill_direction: FillDirection::default(),
            rows: None,
            columns: None,
            frame_start: None,
            frame_end: None,
            frame_step: 1,
            overwrite_policy: OverwritePolicy::default(),
            delete_intermediates: true,
            source_mode: SourceMode::default(),
            write_texture_atlas: false,
            overflow_policy: OverflowPolicy::default(),
        }
    }

    /// Grid hint; zero counts as unset.
    pub fn with_grid(mut self, rows: Option<u32>, columns: Option<u32>) -> Self {
        self.rows = rows.filter(|&r| r > 0);
        self.columns = columns.filter(|&c| c > 0);
        self
    }

    pub fn with_range(mut self, start: Option<i32>, end: Option<i32>) -> Self {
        self.frame_start = start;
        self.frame_end = end;
        self
    }

    pub fn with_step(mut self, step: u32) -> Self {
        self.frame_step = step;
        self
    }

    pub fn with_fill_direction(mut self, direction: FillDirection) -> Self {
        self.fill_direction = direction;
        self
    }

    pub fn with_sprites_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.sprites_dir = dir;
        self
    }

    pub fn with_overwrite_policy(mut self, policy: OverwritePolicy) -> Self {
        self.overwrite_policy = policy;
        self
    }

    pub fn with_delete_intermediates(mut self, delete: bool) -> Self {
        self.delete_intermediates = delete;
        self
    }

    pub fn with_source_mode(mut self, mode: SourceMode) -> Self {
        self.source_mode = mode;
        self
    }

    pub fn with_texture_atlas(mut self, write: bool) -> Self {
        self.write_texture_atlas = write;
        self
    }

    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Sampling step, never below 1.
    pub fn step(&self) -> u32 {
        self.frame_step.max(1)
    }

    /// `<export_dir>/<export_name>_sprites`
    pub fn default_sprites_dir(&self) -> PathBuf {
        self.export_dir.join(format!("{}_sprites", self.export_name))
    }

    /// Requested sprites directory before collision handling.
    pub fn requested_sprites_dir(&self) -> PathBuf {
        self.sprites_dir.clone().unwrap_or_else(|| self.default_sprites_dir())
    }

    /// `<export_dir>/<export_name>.png`
    pub fn sheet_path(&self) -> PathBuf {
        self.export_dir.join(format!("{}.png", self.export_name))
    }

    /// `<export_dir>/<export_name>.json`
    pub fn atlas_path(&self) -> PathBuf {
        self.export_dir.join(format!("{}.json", self.export_name))
    }

    pub fn validate(&self) -> Result<(), ExportError> {
        if self.export_name.is_empty() {
            return Err(ExportError::InvalidJob("export name is empty".into()));
        }
        if self.export_name.contains(['/', '\\']) {
            return Err(ExportError::InvalidJob(format!(
                "export name '{}' contains a path separator",
                self.export_name
            )));
        }
        if let (Some(start), Some(end)) = (self.frame_start, self.frame_end) {
            if start > end {
                return Err(ExportError::InvalidJob(format!("frame start {} is after frame end {}", start, end)));
            }
        }
        Ok(())
    }
}

/// Keep everything before the first `.`, trimmed.
pub fn sanitize_export_name(name: &str) -> String {
    name.split('.').next().unwrap_or("").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let job = ExportJob::new(ExportJob::DEFAULT_NAME, "/tmp/out");
        assert_eq!(job.step(), 1);
        assert!(job.delete_intermediates);
        assert_eq!(job.fill_direction, FillDirection::Horizontal);
        assert_eq!(job.overwrite_policy, OverwritePolicy::ReuseExisting);
        assert_eq!(job.source_mode, SourceMode::TimelineFrames);
        assert_eq!(job.rows, None);
        assert_eq!(job.columns, None);
    }

    #[test]
    fn test_name_is_cut_at_first_dot() {
        let job = ExportJob::new("hero.walk.png", "/tmp/out");
        assert_eq!(job.export_name, "hero");
        assert_eq!(job.sheet_path(), PathBuf::from("/tmp/out/hero.png"));
        assert_eq!(job.atlas_path(), PathBuf::from("/tmp/out/hero.json"));
        assert_eq!(job.default_sprites_dir(), PathBuf::from("/tmp/out/hero_sprites"));
    }

    #[test]
    fn test_zero_grid_values_are_unset() {
        let job = ExportJob::new("a", "/tmp").with_grid(Some(0), Some(3));
        assert_eq!(job.rows, None);
        assert_eq!(job.columns, Some(3));
    }

    #[test]
    fn test_zero_step_means_one() {
        let job = ExportJob::new("a", "/tmp").with_step(0);
        assert_eq!(job.step(), 1);
        assert_eq!(job.with_step(3).step(), 3);
    }

    #[test]
    fn test_validate() {
        assert!(ExportJob::new("a", "/tmp").validate().is_ok());
        assert!(matches!(
            ExportJob::new(".png", "/tmp").validate(),
            Err(ExportError::InvalidJob(_))
        ));
        assert!(matches!(
            ExportJob::new("a", "/tmp").with_range(Some(9), Some(2)).validate(),
            Err(ExportError::InvalidJob(_))
        ));
    }

    #[test]
    fn test_explicit_sprites_dir_wins() {
        let job = ExportJob::new("a", "/tmp").with_sprites_dir(Some(PathBuf::from("/data/frames")));
        assert_eq!(job.requested_sprites_dir(), PathBuf::from("/data/frames"));
    }
}
