//! Progress-callback trait for report compilation events.
//!
//! Inject an [`Arc<dyn CompileProgressCallback>`] via
//! [`crate::config::CompileConfigBuilder::progress_callback`] to receive
//! events as the compiler moves through its stages.
//!
//! # Why callbacks instead of channels?
//!
//! Callers can forward events to a GUI progress widget, a channel or a
//! terminal progress bar without the library knowing how the host
//! application communicates. The compiler calls back synchronously from the
//! thread running the pipeline, so implementations must be `Send + Sync`
//! to be usable from [`crate::compile::ReportCompiler::compile_async`].
//!
//! # Example
//!
//! ```rust
//! use tracecert::{CompileConfig, CompileProgressCallback, Stage};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Recorder {
//!     seen: Mutex<Vec<u8>>,
//! }
//!
//! impl CompileProgressCallback for Recorder {
//!     fn on_progress(&self, percent: u8, _stage: Stage) {
//!         self.seen.lock().unwrap().push(percent);
//!     }
//! }
//!
//! let config = CompileConfig::builder()
//!     .progress_callback(Arc::new(Recorder::default()))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::{CompileWarning, ReportError, Stage};
use crate::model::CompiledReport;
use std::sync::Arc;

/// Called by the report compiler as it runs.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait CompileProgressCallback: Send + Sync {
    /// Called once before the workspace is created.
    ///
    /// # Arguments
    /// * `certificate_count`: certificates handed to the compiler
    fn on_compile_start(&self, certificate_count: usize) {
        let _ = certificate_count;
    }

    /// Called when a stage with a milestone completes.
    ///
    /// Percentages are 5, 20, 30, 50, 60, 70, 80, 90 and 100, always increasing.
    fn on_progress(&self, percent: u8, stage: Stage) {
        let _ = (percent, stage);
    }

    /// Called while the body document is merged.
    ///
    /// # Arguments
    /// * `percent`: share of merge inputs processed, 0–100
    fn on_merge_progress(&self, percent: u8) {
        let _ = percent;
    }

    /// Called for every non-fatal problem as it happens.
    fn on_warning(&self, warning: &CompileWarning) {
        let _ = warning;
    }

    /// Called once with the finished report.
    fn on_compile_complete(&self, report: &CompiledReport) {
        let _ = report;
    }

    /// Called once, instead of `on_compile_complete`, when the compile aborts.
    ///
    /// The error is the same value returned to the caller.
    fn on_compile_failed(&self, error: &ReportError) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl CompileProgressCallback for NoopProgressCallback {}

/// Adapts a `Fn(u8, Stage)` closure to [`CompileProgressCallback::on_progress`].
///
/// The shape matches a plain `(percent, status)` progress hook.
pub struct FnProgress<F>(pub F);

impl<F> CompileProgressCallback for FnProgress<F>
where
    F: Fn(u8, Stage) + Send + Sync,
{
    fn on_progress(&self, percent: u8, stage: Stage) {
        (self.0)(percent, stage)
    }
}

/// Convenience alias matching the type stored in [`crate::config::CompileConfig`].
pub type ProgressCallback = Arc<dyn CompileProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct TrackingCallback {
        starts: AtomicUsize,
        percents: Mutex<Vec<u8>>,
        warnings: AtomicUsize,
    }

    impl CompileProgressCallback for TrackingCallback {
        fn on_compile_start(&self, _certificate_count: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_progress(&self, percent: u8, _stage: Stage) {
            self.percents.lock().unwrap().push(percent);
        }

        fn on_warning(&self, _warning: &CompileWarning) {
            self.warnings.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn tracking_callback_records_events() {
        let cb = TrackingCallback {
            starts: AtomicUsize::new(0),
            percents: Mutex::new(Vec::new()),
            warnings: AtomicUsize::new(0),
        };
        cb.on_compile_start(3);
        cb.on_progress(5, Stage::Workspace);
        cb.on_progress(20, Stage::MainReport);
        cb.on_warning(&CompileWarning::CoverPageCount { pages: 2 });
        cb.on_merge_progress(50);

        assert_eq!(cb.starts.load(Ordering::SeqCst), 1);
        assert_eq!(*cb.percents.lock().unwrap(), vec![5, 20]);
        assert_eq!(cb.warnings.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn noop_callback_does_nothing() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_compile_start(0);
        cb.on_progress(100, Stage::Finish);
        cb.on_compile_failed(&ReportError::Internal("boom".into()));
    }

    #[test]
    fn closure_adapter_forwards_progress() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let cb = FnProgress(move |p: u8, s: Stage| sink.lock().unwrap().push((p, s)));

        cb.on_progress(60, Stage::BodyMerge);
        cb.on_merge_progress(10);
        assert_eq!(*seen.lock().unwrap(), vec![(60, Stage::BodyMerge)]);
    }
}
