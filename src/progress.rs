//! Progress-callback trait for diagram generation events.
//!
//! Inject an [`Arc<dyn DiagramProgressCallback>`] via
//! [`crate::config::DiagramConfigBuilder::progress_callback`] to receive
//! events as the batch orchestrator walks through workflows and as the
//! generation client backs off on rate limits.
//!
//! # Example
//!
//! ```rust
//! use edgequake_text2diagram::{DiagramConfig, DiagramProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//! use std::path::Path;
//!
//! struct CountingCallback {
//!     written: AtomicUsize,
//! }
//!
//! impl DiagramProgressCallback for CountingCallback {
//!     fn on_workflow_complete(&self, index: usize, total: usize, path: &Path) {
//!         self.written.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{index}/{total} → {}", path.display());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { written: AtomicUsize::new(0) });
//!
//! let config = DiagramConfig::builder()
//!     .progress_callback(counter as Arc<dyn DiagramProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Called by the generation pipeline as it works.
///
/// Generation is strictly sequential, so events arrive in order, but
/// implementations must still be `Send + Sync` because the config holding
/// them is shared across tasks. All methods default to no-ops.
pub trait DiagramProgressCallback: Send + Sync {
    /// Called once after extraction, before the first workflow.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before the first request for a workflow.
    ///
    /// # Arguments
    /// * `index` — 1-indexed workflow number
    /// * `total` — workflows in the batch
    /// * `title` — workflow title
    fn on_workflow_start(&self, index: usize, total: usize, title: &str) {
        let _ = (index, total, title);
    }

    /// Called when an attempt was rate-limited and the client is about to sleep.
    ///
    /// # Arguments
    /// * `attempt`      — 1-indexed attempt that was rejected
    /// * `max_attempts` — retry budget
    /// * `wait`         — how long the client will sleep before retrying
    fn on_rate_limited(&self, attempt: u32, max_attempts: u32, wait: Duration) {
        let _ = (attempt, max_attempts, wait);
    }

    /// Called when a workflow's diagram was written.
    fn on_workflow_complete(&self, index: usize, total: usize, path: &Path) {
        let _ = (index, total, path);
    }

    /// Called when a workflow produced no diagram.
    fn on_workflow_error(&self, index: usize, total: usize, title: &str, error: &str) {
        let _ = (index, total, title, error);
    }

    /// Called before the pause between two batch requests.
    fn on_cooldown(&self, wait: Duration) {
        let _ = wait;
    }

    /// Called once after every workflow has been attempted.
    fn on_batch_complete(&self, total: usize, succeeded: usize) {
        let _ = (total, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl DiagramProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DiagramConfig`].
pub type ProgressCallback = Arc<dyn DiagramProgressCallback>;
