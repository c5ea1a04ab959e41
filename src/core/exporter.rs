//! Export orchestrator.
//!
//! Runs one [`ExportJob`] against a host [`Document`]:
//!
//! ```text
//! ResolveFrames -> SolveGrid -> ResolveDestination -> SampleFrames
//!     -> ComposeSheet -> Cleanup -> Done
//! ```
//!
//! Frames and grid are resolved first because they are pure queries: a job
//! with no frames (or a rejected grid) fails before anything is written.
//!
//! Sampling is strictly sequential. Each frame is rendered, awaited and
//! exported before the next time/visibility change is issued.
//!
//! Any failure aborts the remaining stages. Document state (layer visibility,
//! current time) and the sprites directory are scoped guards, so they are
//! restored/cleaned on every exit path.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use log::{debug, info, warn};

use super::atlas::TextureAtlas;
use super::error::ExportError;
use super::grid::{GridGeometry, solve_grid};
use super::guards::{HostStateGuard, SpritesDir};
use super::placement::placement_for;
use super::progress::{CancelToken, ExportProgress, ExportStage, ProgressSink};
use super::resolver::resolve_frames;
use crate::entities::frame::{FrameKey, FrameSet, frame_file_name};
use crate::entities::job::{ExportJob, OverflowPolicy};
use crate::host::{Canvas, Document, DocumentInfo};

/// Result of a finished export
#[derive(Clone, Debug, PartialEq)]
pub struct ExportOutcome {
    pub sheet_path: PathBuf,
    pub atlas_path: Option<PathBuf>,
    pub sprites_dir: PathBuf,
    pub geometry: GridGeometry,
    /// Frames merged onto the sheet
    pub placed: usize,
    /// Frames that did not fit a user-set grid
    pub dropped: usize,
}

/// Runs export jobs; holds only the cancel token and progress listener.
#[derive(Clone, Debug, Default)]
pub struct Exporter {
    cancel: CancelToken,
    progress: ProgressSink,
}

impl Exporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress(mut self, tx: Sender<ExportProgress>) -> Self {
        self.progress = ProgressSink::new(Some(tx));
        self
    }

    /// Export `job` from `doc`; returns where the sheet was written.
    pub fn export<D: Document>(&self, doc: &mut D, job: &ExportJob) -> Result<ExportOutcome, ExportError> {
        job.validate()?;
        info!("Exporting spritesheet '{}' to {}", job.export_name, job.export_dir.display());

        self.progress.send(ExportStage::ResolveFrames, 0, 0);
        let frames = resolve_frames(job, &*doc)?;
        let effective = frames.effective_count();

        self.progress.send(ExportStage::SolveGrid, 0, 0);
        let geometry = solve_grid(effective, job.rows, job.columns);
        if !geometry.fits(effective) {
            match job.overflow_policy {
                OverflowPolicy::Reject => {
                    return Err(ExportError::GridTooSmall {
                        rows: geometry.rows,
                        columns: geometry.columns,
                        frames: effective,
                    });
                }
                OverflowPolicy::DropExcess => warn!(
                    "Grid {}x{} holds {} of {} frames, the rest will be dropped",
                    geometry.columns,
                    geometry.rows,
                    geometry.capacity(),
                    effective
                ),
            }
        }
        info!("Grid: {} columns x {} rows for {} frames", geometry.columns, geometry.rows, effective);

        self.progress.send(ExportStage::ResolveDestination, 0, 0);
        let mut sprites = SpritesDir::acquire(job)?;

        let info = doc.info();
        {
            let mut host = HostStateGuard::capture(doc, frames.layer_snapshot());
            self.sample_frames(&mut host, job, &frames, &mut sprites)?;
        }

        let (placed, dropped, atlas) = self.compose_sheet(&*doc, job, &frames, &geometry, &info, &mut sprites)?;

        self.progress.send(ExportStage::Cleanup, 0, 0);
        let atlas_path = match atlas {
            Some(atlas) => {
                let path = job.atlas_path();
                atlas.write(&path)?;
                info!("Wrote texture atlas {}", path.display());
                Some(path)
            }
            None => None,
        };

        let sprites_dir = sprites.path().to_path_buf();
        if let Err(e) = sprites.release() {
            warn!("Sprites directory cleanup: {}", e);
        }

        self.progress.send(ExportStage::Done, placed, effective);
        let sheet_path = job.sheet_path();
        info!("Spritesheet written to {} ({} frames placed)", sheet_path.display(), placed);

        Ok(ExportOutcome {
            sheet_path,
            atlas_path,
            sprites_dir,
            geometry,
            placed,
            dropped,
        })
    }

    fn check_cancel(&self) -> Result<(), ExportError> {
        if self.cancel.is_cancelled() {
            info!("Export cancelled");
            return Err(ExportError::Cancelled);
        }
        Ok(())
    }

    /// Render and export one intermediate file per emitted frame.
    fn sample_frames<D: Document>(
        &self,
        doc: &mut HostStateGuard<'_, D>,
        job: &ExportJob,
        frames: &FrameSet,
        sprites: &mut SpritesDir,
    ) -> Result<(), ExportError> {
        let total = frames.effective_count();

        // Layer mode: start from an empty stack, then show one leaf at a time
        for frame in frames.iter() {
            if let FrameKey::Layer { id, .. } = frame.key {
                doc.set_layer_visible(id, false)
                    .map_err(|source| ExportError::LayerVisibility { layer: id, source })?;
            }
        }

        for (done, (_, frame)) in frames.emitted().enumerate() {
            self.check_cancel()?;
            self.progress.send(ExportStage::SampleFrames, done, total);

            let raw_index = frame.key.raw_index();
            let path = sprites.frame_path(&job.export_name, raw_index);
            let fail = |source| ExportError::FrameExportFailed {
                raw_index,
                path: path.clone(),
                source,
            };

            match frame.key {
                FrameKey::Time(time) => doc.set_current_time(time),
                FrameKey::Layer { id, .. } => doc.set_layer_visible(id, true).map_err(fail)?,
            }
            doc.wait_for_pending_render().map_err(fail)?;
            doc.export_current_frame(&path).map_err(fail)?;
            sprites.record(path.clone());
            debug!("Exported frame {} -> {}", raw_index, path.display());

            if let FrameKey::Layer { id, .. } = frame.key {
                doc.set_layer_visible(id, false).map_err(fail)?;
            }
        }
        self.progress.send(ExportStage::SampleFrames, total, total);
        Ok(())
    }

    /// Place every emitted frame on a fresh canvas and export the sheet.
    fn compose_sheet<D: Document>(
        &self,
        doc: &D,
        job: &ExportJob,
        frames: &FrameSet,
        geometry: &GridGeometry,
        info: &DocumentInfo,
        sprites: &mut SpritesDir,
    ) -> Result<(usize, usize, Option<TextureAtlas>), ExportError> {
        let total = frames.effective_count();
        let (sheet_width, sheet_height) = geometry.sheet_size(info.width, info.height).ok_or_else(|| {
            ExportError::CompositionFailed {
                reason: format!(
                    "{}x{} grid of {}x{} frames exceeds the maximum sheet size",
                    geometry.columns, geometry.rows, info.width, info.height
                ),
                source: None,
            }
        })?;
        let sheet_path = job.sheet_path();

        let mut canvas = doc
            .create_canvas(sheet_width, sheet_height, &job.export_name, info)
            .map_err(|e| ExportError::composition("cannot create sheet canvas", e))?;
        let mut atlas = job.write_texture_atlas.then(|| {
            TextureAtlas::new(file_name_of(&sheet_path), sheet_width, sheet_height)
        });

        let (mut placed, mut dropped) = (0, 0);
        for (slot, frame) in frames.emitted() {
            self.check_cancel()?;
            self.progress.send(ExportStage::ComposeSheet, slot, total);

            let raw_index = frame.key.raw_index();
            let path = sprites.frame_path(&job.export_name, raw_index);

            if slot as u64 >= geometry.capacity() {
                warn!("Frame {} does not fit the {}x{} grid, dropped", raw_index, geometry.columns, geometry.rows);
                dropped += 1;
            } else {
                let at = placement_for(slot, geometry, info.width, info.height, job.fill_direction);
                let layer = canvas
                    .insert_image_layer(&path)
                    .map_err(|e| ExportError::composition(format!("cannot load frame {}", raw_index), e))?;
                canvas
                    .move_layer(layer, at.x, at.y)
                    .map_err(|e| ExportError::composition(format!("cannot move frame {}", raw_index), e))?;
                // Inserted layers only show up in the output once merged
                canvas
                    .merge_down(layer)
                    .map_err(|e| ExportError::composition(format!("cannot merge frame {}", raw_index), e))?;
                debug!("Placed frame {} (slot {}) at {},{}", raw_index, slot, at.x, at.y);

                if let Some(atlas) = atlas.as_mut() {
                    atlas.push(frame_file_name(&job.export_name, raw_index), at, info.width, info.height);
                }
                placed += 1;
            }

            if job.delete_intermediates {
                sprites.remove_file(&path)?;
            }
        }

        canvas
            .export(&sheet_path)
            .map_err(|e| ExportError::composition(format!("cannot export {}", sheet_path.display()), e))?;
        Ok((placed, dropped, atlas))
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Export `job` from `doc` with default options.
pub fn export<D: Document>(doc: &mut D, job: &ExportJob) -> Result<PathBuf, ExportError> {
    Exporter::new().export(doc, job).map(|outcome| outcome.sheet_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::job::{FillDirection, OverwritePolicy, SourceMode};
    use crate::entities::layer::{LayerId, LayerNode};
    use crate::host::fake::{Call, FakeDocument};

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sprites_export_{}_{}", tag, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn timeline_doc(keys: &[i32]) -> FakeDocument {
        let mut doc = FakeDocument::new(vec![LayerNode::leaf(1, "anim", true).animated()]);
        doc.clip_end = 20;
        for &k in keys {
            doc.add_keyframe(LayerId(1), k);
        }
        doc
    }

    fn layer_doc() -> FakeDocument {
        FakeDocument::new(vec![
            LayerNode::leaf(1, "A", true),
            LayerNode::leaf(2, "B", false),
            LayerNode::leaf(3, "C", true),
        ])
    }

    fn merges(doc: &FakeDocument) -> Vec<(String, u32, u32)> {
        doc.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Merge(path, x, y) => Some((path.file_name().unwrap().to_string_lossy().into_owned(), x, y)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_timeline_export_places_frames_and_cleans_up() {
        let root = temp_dir("timeline");
        let mut doc = timeline_doc(&[2, 5, 9]);
        let job = ExportJob::new("walk", &root).with_step(2);

        let outcome = Exporter::new().export(&mut doc, &job).unwrap();

        // Frames 2,4,6,8 -> 2x2 grid of 8x4 frames
        assert_eq!(outcome.geometry, GridGeometry { rows: 2, columns: 2 });
        assert_eq!(outcome.placed, 4);
        assert_eq!(outcome.sheet_path, root.join("walk.png"));
        assert!(outcome.sheet_path.exists());
        assert!(doc.calls().contains(&Call::CreateCanvas(16, 8)));
        assert_eq!(
            merges(&doc),
            vec![
                ("walk_002.png".to_string(), 0, 0),
                ("walk_004.png".to_string(), 8, 0),
                ("walk_006.png".to_string(), 0, 4),
                ("walk_008.png".to_string(), 8, 4),
            ]
        );
        // Intermediates and the directory this job created are gone
        assert!(!root.join("walk_sprites").exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_every_export_waits_for_render_first() {
        let root = temp_dir("barrier");
        let mut doc = timeline_doc(&[0, 3]);
        let job = ExportJob::new("walk", &root);
        Exporter::new().export(&mut doc, &job).unwrap();

        let calls = doc.calls();
        for (i, call) in calls.iter().enumerate() {
            if let Call::ExportFrame(_) = call {
                assert_eq!(calls[i - 1], Call::Wait, "export without render barrier at {}", i);
                assert!(matches!(calls[i - 2], Call::SetTime(_)));
            }
        }
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_vertical_fill() {
        let root = temp_dir("vertical");
        let mut doc = timeline_doc(&[0, 2]);
        let job = ExportJob::new("walk", &root).with_fill_direction(FillDirection::Vertical);
        Exporter::new().export(&mut doc, &job).unwrap();

        // 3 frames -> 2 columns x 2 rows, filled top-down first
        assert_eq!(
            merges(&doc),
            vec![
                ("walk_000.png".to_string(), 0, 0),
                ("walk_001.png".to_string(), 0, 4),
                ("walk_002.png".to_string(), 8, 0),
            ]
        );
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_keep_intermediates() {
        let root = temp_dir("keep");
        let mut doc = timeline_doc(&[0, 1]);
        let job = ExportJob::new("walk", &root).with_delete_intermediates(false);
        let outcome = Exporter::new().export(&mut doc, &job).unwrap();

        assert!(outcome.sprites_dir.join("walk_000.png").exists());
        assert!(outcome.sprites_dir.join("walk_001.png").exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_layer_mode_skips_hidden_and_restores_visibility() {
        let root = temp_dir("layers");
        let mut doc = layer_doc();
        let job = ExportJob::new("parts", &root).with_source_mode(SourceMode::LayerFrames);
        let outcome = Exporter::new().export(&mut doc, &job).unwrap();

        // B is hidden: no file, no slot; C keeps raw ordinal 2 but takes slot 1
        assert_eq!(outcome.placed, 2);
        assert_eq!(outcome.geometry, GridGeometry { rows: 1, columns: 2 });
        assert_eq!(
            merges(&doc),
            vec![("parts_000.png".to_string(), 0, 0), ("parts_002.png".to_string(), 8, 0)]
        );
        assert!(doc.visible(LayerId(1)));
        assert!(!doc.visible(LayerId(2)));
        assert!(doc.visible(LayerId(3)));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_layer_mode_shows_one_leaf_per_export() {
        let root = temp_dir("solo");
        let mut doc = layer_doc();
        let job = ExportJob::new("parts", &root).with_source_mode(SourceMode::LayerFrames);
        Exporter::new().export(&mut doc, &job).unwrap();

        let calls = doc.calls();
        let first_export = calls.iter().position(|c| matches!(c, Call::ExportFrame(_))).unwrap();
        // Every leaf hidden, then A shown, before the first export
        assert_eq!(
            &calls[..first_export],
            &[
                Call::SetVisible(LayerId(1), false),
                Call::SetVisible(LayerId(2), false),
                Call::SetVisible(LayerId(3), false),
                Call::SetVisible(LayerId(1), true),
                Call::Wait,
            ]
        );
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_failure_restores_visibility_and_cleans_created_dir() {
        let root = temp_dir("fail");
        let mut doc = layer_doc();
        doc.fail_frame_export = Some(1);
        let job = ExportJob::new("parts", &root).with_source_mode(SourceMode::LayerFrames);

        let err = Exporter::new().export(&mut doc, &job).unwrap_err();
        assert!(matches!(err, ExportError::FrameExportFailed { raw_index: 2, .. }));

        assert!(doc.visible(LayerId(1)));
        assert!(!doc.visible(LayerId(2)));
        assert!(doc.visible(LayerId(3)));
        assert!(!root.join("parts_sprites").exists());
        assert!(!root.join("parts.png").exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_failure_never_removes_existing_dir() {
        let root = temp_dir("existing");
        let sprites = root.join("walk_sprites");
        std::fs::create_dir_all(&sprites).unwrap();
        let mut doc = timeline_doc(&[0, 4]);
        doc.fail_canvas_export = true;
        let job = ExportJob::new("walk", &root);

        let err = Exporter::new().export(&mut doc, &job).unwrap_err();
        assert!(matches!(err, ExportError::CompositionFailed { .. }));
        assert!(sprites.is_dir());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_canvas_creation_failure_cleans_up() {
        let root = temp_dir("no_canvas");
        let mut doc = timeline_doc(&[0, 3]);
        doc.fail_create_canvas = true;
        let job = ExportJob::new("walk", &root);

        let err = Exporter::new().export(&mut doc, &job).unwrap_err();
        assert!(matches!(err, ExportError::CompositionFailed { source: Some(_), .. }));
        assert!(!root.join("walk_sprites").exists());
        assert!(!root.join("walk.png").exists());
        assert_eq!(doc.current_time(), 0);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_oversized_sheet_fails_composition() {
        let root = temp_dir("huge");
        let mut doc = timeline_doc(&[0, 1]);
        doc.width = 3_000_000_000;
        let job = ExportJob::new("walk", &root);

        // 2 frames -> 2 columns, 6e9 px wide
        let err = Exporter::new().export(&mut doc, &job).unwrap_err();
        assert!(matches!(err, ExportError::CompositionFailed { source: None, .. }));
        assert!(!doc.calls().iter().any(|c| matches!(c, Call::CreateCanvas(..))));
        assert!(!root.join("walk_sprites").exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_hide_failure_reports_layer_and_restores() {
        let root = temp_dir("hide");
        let mut doc = layer_doc();
        doc.fail_visibility = Some(LayerId(3));
        let job = ExportJob::new("parts", &root).with_source_mode(SourceMode::LayerFrames);

        let err = Exporter::new().export(&mut doc, &job).unwrap_err();
        assert!(matches!(err, ExportError::LayerVisibility { layer: LayerId(3), .. }));
        assert!(!doc.calls().iter().any(|c| matches!(c, Call::ExportFrame(_))));
        assert!(doc.visible(LayerId(1)));
        assert!(!doc.visible(LayerId(2)));
        assert!(!root.join("parts_sprites").exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_success_keeps_existing_empty_dir() {
        let root = temp_dir("existing_ok");
        let sprites = root.join("walk_sprites");
        std::fs::create_dir_all(&sprites).unwrap();
        let mut doc = timeline_doc(&[0]);
        Exporter::new().export(&mut doc, &ExportJob::new("walk", &root)).unwrap();

        assert!(sprites.is_dir());
        assert_eq!(std::fs::read_dir(&sprites).unwrap().count(), 0);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_no_frames_touches_nothing() {
        let root = temp_dir("empty");
        let mut doc = FakeDocument::new(vec![LayerNode::leaf(1, "A", false)]);
        let job = ExportJob::new("parts", &root).with_source_mode(SourceMode::LayerFrames);

        assert!(matches!(
            Exporter::new().export(&mut doc, &job),
            Err(ExportError::NoFramesFound)
        ));
        assert!(!root.join("parts_sprites").exists());
        assert!(doc.calls().is_empty());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_small_grid_drops_excess_by_default() {
        let root = temp_dir("drop");
        let mut doc = timeline_doc(&[0, 5]);
        let job = ExportJob::new("walk", &root).with_grid(Some(1), Some(2)).with_texture_atlas(true);
        let outcome = Exporter::new().export(&mut doc, &job).unwrap();

        assert_eq!(outcome.placed, 2);
        assert_eq!(outcome.dropped, 4);
        // Dropped frames are still cleaned up with the rest
        assert!(!root.join("walk_sprites").exists());

        let atlas: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(outcome.atlas_path.unwrap()).unwrap()).unwrap();
        assert_eq!(atlas["frames"].as_object().unwrap().len(), 2);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_small_grid_rejected_before_io() {
        let root = temp_dir("reject");
        let mut doc = timeline_doc(&[0, 5]);
        let job = ExportJob::new("walk", &root)
            .with_grid(Some(1), Some(2))
            .with_overflow_policy(OverflowPolicy::Reject);

        assert!(matches!(
            Exporter::new().export(&mut doc, &job),
            Err(ExportError::GridTooSmall { rows: 1, columns: 2, frames: 6 })
        ));
        assert!(!root.join("walk_sprites").exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_cancel_before_sampling() {
        let root = temp_dir("cancel");
        let mut doc = layer_doc();
        let token = CancelToken::new();
        token.cancel();
        let job = ExportJob::new("parts", &root).with_source_mode(SourceMode::LayerFrames);

        let err = Exporter::new().with_cancel_token(token).export(&mut doc, &job).unwrap_err();
        assert!(matches!(err, ExportError::Cancelled));
        assert!(doc.visible(LayerId(1)));
        assert!(!doc.visible(LayerId(2)));
        assert!(!root.join("parts_sprites").exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_always_create_new_uses_fresh_dir() {
        let root = temp_dir("fresh");
        std::fs::create_dir_all(root.join("walk_sprites")).unwrap();
        let mut doc = timeline_doc(&[0]);
        let job = ExportJob::new("walk", &root)
            .with_overwrite_policy(OverwritePolicy::AlwaysCreateNew)
            .with_delete_intermediates(false);
        let outcome = Exporter::new().export(&mut doc, &job).unwrap();

        assert_eq!(outcome.sprites_dir, root.join("walk_sprites0"));
        assert!(root.join("walk_sprites0").join("walk_000.png").exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_progress_reports_stages_in_order() {
        let root = temp_dir("progress");
        let mut doc = timeline_doc(&[0, 1]);
        let (tx, rx) = std::sync::mpsc::channel();
        Exporter::new()
            .with_progress(tx)
            .export(&mut doc, &ExportJob::new("walk", &root))
            .unwrap();

        let mut stages: Vec<ExportStage> = rx.try_iter().map(|p| p.stage).collect();
        stages.dedup();
        assert_eq!(
            stages,
            vec![
                ExportStage::ResolveFrames,
                ExportStage::SolveGrid,
                ExportStage::ResolveDestination,
                ExportStage::SampleFrames,
                ExportStage::ComposeSheet,
                ExportStage::Cleanup,
                ExportStage::Done,
            ]
        );
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_export_returns_sheet_path() {
        let root = temp_dir("path");
        let mut doc = timeline_doc(&[0]);
        let path = export(&mut doc, &ExportJob::new("one.png", &root)).unwrap();
        assert_eq!(path, root.join("one.png"));
        let _ = std::fs::remove_dir_all(&root);
    }
}
