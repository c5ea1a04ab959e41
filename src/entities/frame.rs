//! Frame descriptors produced by the frame source resolver.
//!
//! A [`FrameSet`] keeps every resolved frame in composition order. In layer
//! mode, leaves that were hidden when the export started stay in the set (they
//! own a raw ordinal) but are not emitted: they are never rendered and never
//! take a grid slot.

use std::path::{Path, PathBuf};

use super::layer::LayerId;

/// Where a frame comes from on the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKey {
    /// Timeline sample at this frame time
    Time(i32),
    /// Leaf layer at this depth-first ordinal
    Layer { ordinal: usize, id: LayerId },
}

impl FrameKey {
    /// Raw source index used in intermediate file names.
    pub fn raw_index(&self) -> i64 {
        match self {
            FrameKey::Time(time) => *time as i64,
            FrameKey::Layer { ordinal, .. } => *ordinal as i64,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameDescriptor {
    /// 0-based position in the resolved set (contiguous, composition order)
    pub sequence_index: usize,
    pub key: FrameKey,
    /// Visibility snapshot; only meaningful for layer frames
    pub visible: bool,
}

/// Ordered, job-scoped set of frames to export.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameSet {
    frames: Vec<FrameDescriptor>,
    off_layers: usize,
}

impl FrameSet {
    /// Timeline frames, one per sampled time.
    pub fn from_times(times: impl IntoIterator<Item = i32>) -> Self {
        let frames = times
            .into_iter()
            .enumerate()
            .map(|(sequence_index, time)| FrameDescriptor {
                sequence_index,
                key: FrameKey::Time(time),
                visible: true,
            })
            .collect();
        Self { frames, off_layers: 0 }
    }

    /// Layer frames, one per leaf `(id, visible)` in traversal order.
    pub fn from_leaves(leaves: impl IntoIterator<Item = (LayerId, bool)>) -> Self {
        let frames: Vec<FrameDescriptor> = leaves
            .into_iter()
            .enumerate()
            .map(|(ordinal, (id, visible))| FrameDescriptor {
                sequence_index: ordinal,
                key: FrameKey::Layer { ordinal, id },
                visible,
            })
            .collect();
        let off_layers = frames.iter().filter(|f| !f.visible).count();
        Self { frames, off_layers }
    }

    /// All resolved frames, including skipped hidden leaves.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of leaves that were hidden when the set was resolved.
    pub fn off_layers(&self) -> usize {
        self.off_layers
    }

    /// Frames that will actually be placed on the sheet.
    pub fn effective_count(&self) -> usize {
        self.frames.len() - self.off_layers
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameDescriptor> + '_ {
        self.frames.iter()
    }

    /// Emitted frames paired with their renumbered placement slot.
    pub fn emitted(&self) -> impl Iterator<Item = (usize, &FrameDescriptor)> + '_ {
        self.frames.iter().filter(|f| f.visible).enumerate()
    }

    /// Layer id and snapshot visibility of every layer frame.
    pub fn layer_snapshot(&self) -> Vec<(LayerId, bool)> {
        self.frames
            .iter()
            .filter_map(|f| match f.key {
                FrameKey::Layer { id, .. } => Some((id, f.visible)),
                FrameKey::Time(_) => None,
            })
            .collect()
    }
}

/// Intermediate file name: `<export_name>_<index padded to 3 digits>.png`.
pub fn frame_file_name(export_name: &str, raw_index: i64) -> String {
    format!("{}_{:03}.png", export_name, raw_index)
}

pub fn frame_file_path(dir: &Path, export_name: &str, raw_index: i64) -> PathBuf {
    dir.join(frame_file_name(export_name, raw_index))
}
