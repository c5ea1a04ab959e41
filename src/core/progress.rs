//! Progress reporting and cooperative cancellation for exports.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;

/// Export stages, in execution order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportStage {
    ResolveFrames,      // Query document for frames
    SolveGrid,          // Derive rows/columns
    ResolveDestination, // Pick/create sprites directory
    SampleFrames,       // Render + export one file per frame
    ComposeSheet,       // Place frames on the sheet canvas
    Cleanup,            // Export sheet, remove intermediates
    Done,
}

impl std::fmt::Display for ExportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportStage::ResolveFrames => write!(f, "Resolving frames"),
            ExportStage::SolveGrid => write!(f, "Solving grid"),
            ExportStage::ResolveDestination => write!(f, "Preparing sprites directory"),
            ExportStage::SampleFrames => write!(f, "Exporting frames"),
            ExportStage::ComposeSheet => write!(f, "Composing sheet"),
            ExportStage::Cleanup => write!(f, "Cleaning up"),
            ExportStage::Done => write!(f, "Done"),
        }
    }
}

/// Progress update sent during an export
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportProgress {
    pub stage: ExportStage,
    pub current: usize,
    pub total: usize,
}

/// Shared cancellation flag, checked between frame samples.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Sends progress to an optional listener; a dropped receiver is ignored.
#[derive(Clone, Debug, Default)]
pub(crate) struct ProgressSink(Option<Sender<ExportProgress>>);

impl ProgressSink {
    pub(crate) fn new(tx: Option<Sender<ExportProgress>>) -> Self {
        Self(tx)
    }

    pub(crate) fn send(&self, stage: ExportStage, current: usize, total: usize) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(ExportProgress { stage, current, total });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_sink_ignores_dropped_receiver() {
        let (tx, rx) = std::sync::mpsc::channel();
        let sink = ProgressSink::new(Some(tx));
        sink.send(ExportStage::SampleFrames, 1, 3);
        assert_eq!(
            rx.recv().unwrap(),
            ExportProgress { stage: ExportStage::SampleFrames, current: 1, total: 3 }
        );
        drop(rx);
        sink.send(ExportStage::Done, 3, 3);
    }
}
