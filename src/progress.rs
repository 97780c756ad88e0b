//! Callback trait for workflow events.
//!
//! Inject an [`Arc<dyn WorkflowCallback>`] via
//! [`crate::config::WorkflowConfigBuilder::callback`] to observe the workflow
//! as it runs: every progress tick (a repaint in a UI), every status change,
//! user-facing error messages (toasts) and the saved package.
//!
//! # Example
//!
//! ```rust
//! use quiz2qti::{WorkflowCallback, WorkflowConfig};
//! use std::sync::{Arc, atomic::{AtomicU8, Ordering}};
//!
//! struct LastProgress(AtomicU8);
//!
//! impl WorkflowCallback for LastProgress {
//!     fn on_progress(&self, _episode: u64, progress: u8) {
//!         self.0.store(progress, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = WorkflowConfig::builder()
//!     .callback(Arc::new(LastProgress(AtomicU8::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::engine::ConversionStatus;
use std::path::Path;
use std::sync::Arc;

/// Called by the workflow as it moves through an episode.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Calls come from the task driving the workflow, one
/// at a time.
pub trait WorkflowCallback: Send + Sync {
    /// A new episode entered `processing` with progress reset to 0.
    fn on_episode_start(&self, episode: u64) {
        let _ = episode;
    }

    /// Progress advanced by one tick.
    fn on_progress(&self, episode: u64, progress: u8) {
        let _ = (episode, progress);
    }

    /// Status changed.
    fn on_status_change(&self, from: ConversionStatus, to: ConversionStatus) {
        let _ = (from, to);
    }

    /// Preview questions were stored and the dialog opened.
    fn on_preview_ready(&self, episode: u64, question_count: usize) {
        let _ = (episode, question_count);
    }

    /// A recoverable error the user should be told about.
    fn on_error(&self, message: &str) {
        let _ = message;
    }

    /// The exported package was written to disk.
    fn on_package_saved(&self, path: &Path, size_bytes: usize) {
        let _ = (path, size_bytes);
    }
}

/// A no-op implementation for callers that don't need events.
pub struct NoopCallback;

impl WorkflowCallback for NoopCallback {}

/// Convenience alias matching the type stored in [`crate::config::WorkflowConfig`].
pub type CallbackRef = Arc<dyn WorkflowCallback>;
