//! Image sequence detection utilities
//!
//! Finds the numbered frames of an image sequence from a glob pattern such as
//! `renders/walk_*.png`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::host::HostError;

/// One numbered file of a sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceFrame {
    pub number: i32,
    pub path: PathBuf,
}

/// Detect a sequence from a glob pattern.
///
/// Files are grouped by `(prefix, ext)`; the largest group wins. Frames are
/// returned sorted by number.
pub fn detect_sequence(pattern: &str) -> Result<Vec<SequenceFrame>, HostError> {
    let paths = glob_paths(pattern)?;
    if paths.is_empty() {
        return Err(HostError::InvalidScene(format!("No files matched pattern: {}", pattern)));
    }

    // Group by (prefix, ext)
    let mut groups: HashMap<(String, String), Vec<SequenceFrame>> = HashMap::new();
    for path in paths {
        if let Some((prefix, number, ext)) = split_sequence_path(&path)? {
            groups.entry((prefix, ext)).or_default().push(SequenceFrame { number, path });
        }
    }

    // Largest group; ties broken by prefix so the pick is stable
    let ((prefix, ext), mut frames) = groups
        .into_iter()
        .max_by(|(ka, va), (kb, vb)| va.len().cmp(&vb.len()).then_with(|| kb.cmp(ka)))
        .ok_or_else(|| HostError::InvalidScene(format!("No numbered files in: {}", pattern)))?;

    frames.sort_by_key(|f| f.number);
    frames.dedup_by_key(|f| f.number);

    info!(
        "Detected sequence: {}*.{} ({} frames, {}..{})",
        prefix,
        ext,
        frames.len(),
        frames.first().map(|f| f.number).unwrap_or(0),
        frames.last().map(|f| f.number).unwrap_or(0)
    );
    Ok(frames)
}

/// Expand a glob pattern into a list of paths
fn glob_paths(pattern: &str) -> Result<Vec<PathBuf>, HostError> {
    let mut paths = Vec::new();
    for entry in glob::glob(pattern)
        .map_err(|e| HostError::InvalidScene(format!("Glob error for pattern {}: {}", pattern, e)))?
    {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(e) => {
                return Err(HostError::Io {
                    path: e.path().to_path_buf(),
                    source: e.into_error(),
                });
            }
        }
    }
    debug!("Glob {} -> {} file(s)", pattern, paths.len());
    Ok(paths)
}

/// Split a sequence filename into (prefix, number, ext)
///
/// Example: "/path/seq.0001.png" -> ("/path/seq.", 1, "png")
fn split_sequence_path(path: &Path) -> Result<Option<(String, i32, String)>, HostError> {
    let ext = match path.extension().and_then(|s| s.to_str()) {
        Some(e) => e.to_string(),
        None => return Ok(None),
    };

    let stem = match path.file_stem().and_then(|s| s.to_str()) {
        Some(s) => s,
        None => return Ok(None),
    };

    // Find trailing digits in stem
    let digit_start = stem
        .char_indices()
        .rev()
        .take_while(|(_, ch)| ch.is_ascii_digit())
        .last()
        .map(|(i, _)| i);
    let Some(digit_start) = digit_start else {
        return Ok(None);
    };

    let number_str = &stem[digit_start..];
    let number = number_str
        .parse::<i32>()
        .map_err(|e| HostError::InvalidScene(format!("Invalid frame number '{}': {}", number_str, e)))?;

    // Full prefix including parent directory
    let mut prefix = String::new();
    if let Some(parent) = path.parent() {
        prefix.push_str(&parent.to_string_lossy());
        if !prefix.is_empty() && !prefix.ends_with(std::path::MAIN_SEPARATOR) {
            prefix.push(std::path::MAIN_SEPARATOR);
        }
    }
    prefix.push_str(&stem[..digit_start]);

    Ok(Some((prefix, number, ext)))
}
