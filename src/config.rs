//! Configuration paths and saved export settings.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::entities::job::{ExportJob, FillDirection, OverflowPolicy, OverwritePolicy, SourceMode};

/// Settings file looked up in the config directory
pub const SETTINGS_FILE: &str = "spritesheet.json";
/// Default `--log` target in the data directory
pub const LOG_FILE: &str = "spritesheet.log";

const APP_DIR: &str = "spritesheet";

/// Configuration for overriding default application paths
#[derive(Debug, Clone)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Create PathConfig from CLI arguments and environment variables
    ///
    /// Priority: CLI args → ENV var (SPRITESHEET_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| {
            std::env::var("SPRITESHEET_CONFIG_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
        });

        Self { config_dir }
    }
}

/// Get path to a configuration file
///
/// Priority:
/// 1. CLI --config-dir argument
/// 2. SPRITESHEET_CONFIG_DIR environment variable
/// 3. Platform-specific config directory from dirs-next (default)
///
/// Platform paths:
/// - Linux: ~/.config/spritesheet/{name}
/// - macOS: ~/Library/Application Support/spritesheet/{name}
/// - Windows: %APPDATA%\spritesheet\{name}
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    get_config_dir(config).join(name)
}

/// Get path to a data file (logs)
///
/// Same priority as [`config_file`], falling back to the platform data
/// directory (~/.local/share/spritesheet on Linux).
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    get_data_dir(config).join(name)
}

/// Ensure that configuration and data directories exist
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = get_config_dir(config);
    let data_dir = get_data_dir(config);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
    }

    // Only create data_dir if it's different from config_dir
    if data_dir != config_dir && !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    }

    Ok(())
}

fn get_config_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    dirs_next::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn get_data_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    dirs_next::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Home directory; exports land there unless told otherwise.
pub fn default_export_dir() -> PathBuf {
    dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Persistent export preset
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ExportSettings {
    pub export_name: String,
    /// `None` = home directory
    pub export_dir: Option<PathBuf>,
    pub sprites_dir: Option<PathBuf>,
    pub fill_direction: FillDirection,
    pub rows: Option<u32>,
    pub columns: Option<u32>,
    pub frame_start: Option<i32>,
    pub frame_end: Option<i32>,
    pub frame_step: u32,
    pub overwrite_policy: OverwritePolicy,
    pub delete_intermediates: bool,
    pub source_mode: SourceMode,
    pub write_texture_atlas: bool,
    pub overflow_policy: OverflowPolicy,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            export_name: ExportJob::DEFAULT_NAME.to_string(),
            export_dir: None,
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
}

impl ExportSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Invalid settings file: {}", path.display()))
    }

    /// Load `path` if present, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write settings: {}", path.display()))
    }

    pub fn to_job(&self) -> ExportJob {
        let export_dir = self.export_dir.clone().unwrap_or_else(default_export_dir);
        ExportJob::new(&self.export_name, export_dir)
            .with_sprites_dir(self.sprites_dir.clone())
            .with_fill_direction(self.fill_direction)
            .with_grid(self.rows, self.columns)
            .with_range(self.frame_start, self.frame_end)
            .with_step(self.frame_step)
            .with_overwrite_policy(self.overwrite_policy)
            .with_delete_intermediates(self.delete_intermediates)
            .with_source_mode(self.source_mode)
            .with_texture_atlas(self.write_texture_atlas)
            .with_overflow_policy(self.overflow_policy)
    }
}
