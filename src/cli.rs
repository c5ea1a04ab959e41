use clap::Parser;
use std::path::PathBuf;

use crate::config::ExportSettings;
use crate::entities::job::{FillDirection, OverflowPolicy, OverwritePolicy, SourceMode};

// Build version with backend info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Images: image 0.25 (PNG, JPEG, TGA, TIFF)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Pack the frames of an animated scene into a single spritesheet
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// JSON scene manifest to export
    #[arg(value_name = "SCENE", conflicts_with = "sequence")]
    pub scene: Option<PathBuf>,

    /// Numbered image sequence to export instead of a scene (e.g. "walk_*.png")
    #[arg(short = 's', long = "sequence", value_name = "GLOB")]
    pub sequence: Option<String>,

    /// Sheet name; anything after the first '.' is dropped
    #[arg(short = 'n', long = "name", value_name = "NAME")]
    pub name: Option<String>,

    /// Directory the sheet is written to (default: home)
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub export_dir: Option<PathBuf>,

    /// Directory for intermediate frames (default: <DIR>/<NAME>_sprites)
    #[arg(long = "sprites-dir", value_name = "DIR")]
    pub sprites_dir: Option<PathBuf>,

    /// Grid rows (0 = auto)
    #[arg(long = "rows", value_name = "N")]
    pub rows: Option<u32>,

    /// Grid columns (0 = auto)
    #[arg(long = "columns", value_name = "N")]
    pub columns: Option<u32>,

    /// First frame (default: first keyframe)
    #[arg(long = "start", value_name = "N", allow_negative_numbers = true)]
    pub start: Option<i32>,

    /// Last frame (default: last keyframe)
    #[arg(long = "end", value_name = "N", allow_negative_numbers = true)]
    pub end: Option<i32>,

    /// Sample every N-th frame
    #[arg(long = "step", value_name = "N")]
    pub step: Option<u32>,

    /// Fill columns first instead of rows
    #[arg(long = "vertical")]
    pub vertical: bool,

    /// One frame per leaf layer instead of per timeline frame
    #[arg(long = "layers")]
    pub layers: bool,

    /// Never reuse an existing sprites directory, append a number instead
    #[arg(long = "force-new")]
    pub force_new: bool,

    /// Keep the intermediate frame files
    #[arg(long = "keep-sprites")]
    pub keep_sprites: bool,

    /// Also write a JSON texture atlas next to the sheet
    #[arg(long = "atlas")]
    pub atlas: bool,

    /// Fail instead of dropping frames that do not fit --rows x --columns
    #[arg(long = "strict-grid")]
    pub strict_grid: bool,

    /// Load export settings from a preset file
    #[arg(short = 'p', long = "preset", value_name = "FILE")]
    pub preset: Option<PathBuf>,

    /// Save the effective settings as the default preset
    #[arg(long = "save-preset")]
    pub save_preset: bool,

    /// Enable debug logging to file (default: spritesheet.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

impl Args {
    /// Overlay command-line options on loaded settings.
    ///
    /// Flags only ever switch a setting on; unset options keep the preset value.
    pub fn apply(&self, settings: &mut ExportSettings) {
        if let Some(name) = &self.name {
            settings.export_name = name.clone();
        }
        if let Some(dir) = &self.export_dir {
            settings.export_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.sprites_dir {
            settings.sprites_dir = Some(dir.clone());
        }
        if let Some(rows) = self.rows {
            settings.rows = Some(rows).filter(|&r| r > 0);
        }
        if let Some(columns) = self.columns {
            settings.columns = Some(columns).filter(|&c| c > 0);
        }
        if self.start.is_some() {
            settings.frame_start = self.start;
        }
        if self.end.is_some() {
            settings.frame_end = self.end;
        }
        if let Some(step) = self.step {
            settings.frame_step = step;
        }
        if self.vertical {
            settings.fill_direction = FillDirection::Vertical;
        }
        if self.layers {
            settings.source_mode = SourceMode::LayerFrames;
        }
        if self.force_new {
            settings.overwrite_policy = OverwritePolicy::AlwaysCreateNew;
        }
        if self.keep_sprites {
            settings.delete_intermediates = false;
        }
        if self.atlas {
            settings.write_texture_atlas = true;
        }
        if self.strict_grid {
            settings.overflow_policy = OverflowPolicy::Reject;
        }
    }
}
