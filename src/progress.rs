//! Progress-callback trait for submission events.
//!
//! Inject an [`Arc<dyn SheetProgressCallback>`] via
//! [`crate::config::SheetConfigBuilder::progress_callback`] to receive the
//! stage events and notifications of a submission as they happen.
//!
//! # Example
//!
//! ```rust
//! use revisio::{Notification, SheetConfig, SheetProgressCallback};
//! use std::sync::{Arc, Mutex};
//!
//! struct Toasts {
//!     shown: Mutex<Vec<String>>,
//! }
//!
//! impl SheetProgressCallback for Toasts {
//!     fn on_notification(&self, notification: &Notification) {
//!         self.shown.lock().unwrap().push(notification.title.clone());
//!     }
//! }
//!
//! let toasts = Arc::new(Toasts { shown: Mutex::new(Vec::new()) });
//! let config = SheetConfig::builder()
//!     .progress_callback(toasts as Arc<dyn SheetProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Stage;
use crate::notification::Notification;
use std::sync::Arc;

/// Called by the orchestrator as a submission moves through its stages.
///
/// Implementations must be `Send + Sync`: independent submissions may run on
/// different tasks and share one callback. All methods default to no-ops so
/// callers only override what they care about.
pub trait SheetProgressCallback: Send + Sync {
    /// Called just before the model request of a stage is sent.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage produced usable output.
    ///
    /// `items` is the number of extracted points for stage 1 and the byte
    /// length of the Markdown for stage 2.
    fn on_stage_complete(&self, stage: Stage, items: usize) {
        let _ = (stage, items);
    }

    /// Called when a stage failed (schema violation, upstream error, timeout).
    fn on_stage_error(&self, stage: Stage, error: String) {
        let _ = (stage, error);
    }

    /// Called for every user-visible notification, progress and failures alike.
    fn on_notification(&self, notification: &Notification) {
        let _ = notification;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SheetProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SheetConfig`].
pub type ProgressCallback = Arc<dyn SheetProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl SheetProgressCallback for TrackingCallback {
        fn on_stage_start(&self, _stage: Stage) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_stage_complete(&self, _stage: Stage, _items: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_stage_error(&self, _stage: Stage, _error: String) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::Extraction);
        cb.on_stage_complete(Stage::Extraction, 3);
        cb.on_stage_error(Stage::Supplementation, "timeout".into());
        cb.on_notification(&Notification::info("Step 1/2", ""));
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        };
        tracker.on_stage_start(Stage::Extraction);
        tracker.on_stage_complete(Stage::Extraction, 4);
        tracker.on_stage_start(Stage::Supplementation);
        tracker.on_stage_error(Stage::Supplementation, "quota".into());

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn arc_dyn_callback_moves_into_spawned_task() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        tokio::spawn(async move {
            cb.on_stage_error(Stage::Extraction, "network".to_string());
        })
        .await
        .expect("spawn must succeed");
    }
}
