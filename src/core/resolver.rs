//! Frame source resolver.
//!
//! Turns a job and the host document into the ordered [`FrameSet`] to export.
//!
//! # Timeline mode
//!
//! Unset boundaries are looked up on the visible animated layers:
//! - start: first keyframe at or after 0 (minimum over layers)
//! - end: last keyframe at or before the clip end (maximum over layers)
//!
//! Hosts without per-time keyframe queries fall back to `0..=100`. The range
//! is sampled every `step` frames, giving `ceil((end - start + 1) / step)`
//! frames.
//!
//! # Layer mode
//!
//! One frame per leaf layer, depth-first. Hidden leaves are recorded (they
//! keep their ordinal) but not emitted.

use log::{debug, info};

use super::error::ExportError;
use crate::entities::frame::FrameSet;
use crate::entities::job::{ExportJob, SourceMode};
use crate::entities::layer::{self, LayerId};
use crate::host::Document;

/// Range used when the host cannot be asked for keyframes.
pub const FALLBACK_RANGE: (i32, i32) = (0, 100);

/// Inclusive sampling range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimelineRange {
    pub start: i32,
    pub end: i32,
    pub step: u32,
}

impl TimelineRange {
    /// `ceil((end - start + 1) / step)`, 0 for an empty range.
    pub fn frame_count(&self) -> usize {
        if self.end < self.start {
            return 0;
        }
        let span = (self.end as i64 - self.start as i64 + 1) as u64;
        span.div_ceil(self.step.max(1) as u64) as usize
    }

    pub fn times(&self) -> impl Iterator<Item = i32> + use<> {
        let (start, step) = (self.start, self.step.max(1) as i64);
        (0..self.frame_count() as i64).map(move |i| (start as i64 + i * step) as i32)
    }
}

/// Resolve the frames `job` exports from `doc`.
pub fn resolve_frames<D: Document + ?Sized>(job: &ExportJob, doc: &D) -> Result<FrameSet, ExportError> {
    let frames = match job.source_mode {
        SourceMode::TimelineFrames => {
            let range = resolve_timeline_range(job, doc);
            info!(
                "Timeline range {}..={} step {} ({} frames)",
                range.start,
                range.end,
                range.step,
                range.frame_count()
            );
            FrameSet::from_times(range.times())
        }
        SourceMode::LayerFrames => {
            let layers = doc.top_level_layers();
            let leaves: Vec<(LayerId, bool)> = layer::leaf_layers(&layers)
                .into_iter()
                .map(|leaf| (leaf.id, leaf.visible))
                .collect();
            let set = FrameSet::from_leaves(leaves);
            info!(
                "Layer frames: {} leaves, {} hidden",
                set.len(),
                set.off_layers()
            );
            set
        }
    };

    if frames.effective_count() == 0 {
        return Err(ExportError::NoFramesFound);
    }
    Ok(frames)
}

/// Fill unset start/end from the document's keyframes.
pub fn resolve_timeline_range<D: Document + ?Sized>(job: &ExportJob, doc: &D) -> TimelineRange {
    let step = job.step();

    if !doc.supports_keyframe_queries() {
        debug!("Host has no keyframe queries, using fallback range");
        return TimelineRange {
            start: job.frame_start.unwrap_or(FALLBACK_RANGE.0),
            end: job.frame_end.unwrap_or(FALLBACK_RANGE.1),
            step,
        };
    }

    let clip_end = doc.clip_range_end();
    let animated = if job.frame_start.is_none() || job.frame_end.is_none() {
        layer::visible_animated_layers(&doc.top_level_layers())
    } else {
        Vec::new()
    };

    // Without keyframes the document is a still: export frame 0 only
    let start = job.frame_start.unwrap_or_else(|| {
        animated
            .iter()
            .filter_map(|&id| first_keyframe(doc, id, clip_end))
            .min()
            .unwrap_or(0)
    });
    let end = job.frame_end.unwrap_or_else(|| {
        animated
            .iter()
            .filter_map(|&id| last_keyframe(doc, id, clip_end))
            .max()
            .unwrap_or(0)
    });

    TimelineRange { start, end, step }
}

/// First keyframe in `0..=clip_end`, searching forward.
fn first_keyframe<D: Document + ?Sized>(doc: &D, layer: LayerId, clip_end: i32) -> Option<i32> {
    (0..=clip_end).find(|&time| doc.has_keyframe_at(layer, time))
}

/// Last keyframe in `0..=clip_end`, searching backward.
fn last_keyframe<D: Document + ?Sized>(doc: &D, layer: LayerId, clip_end: i32) -> Option<i32> {
    (0..=clip_end).rev().find(|&time| doc.has_keyframe_at(layer, time))
}
