//! Progress-callback trait for per-attempt harvest events.
//!
//! Inject an [`Arc<dyn HarvestProgressCallback>`] via
//! [`crate::config::HarvestConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through each identifier.
//!
//! # Example
//!
//! ```rust
//! use uspto_harvest::{ArtifactKind, HarvestConfig, HarvestProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct SavedCounter {
//!     saved: AtomicUsize,
//! }
//!
//! impl HarvestProgressCallback for SavedCounter {
//!     fn on_artifact_saved(&self, identifier: &str, kind: ArtifactKind, bytes: u64) {
//!         self.saved.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{identifier} [{kind}] {bytes} bytes");
//!     }
//! }
//!
//! let counter = Arc::new(SavedCounter { saved: AtomicUsize::new(0) });
//!
//! let config = HarvestConfig::builder()
//!     .progress_callback(counter as Arc<dyn HarvestProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ArtifactKind;
use std::sync::Arc;
use std::time::Duration;

/// Called by the orchestrator as it processes each artifact.
///
/// Implementations must be `Send + Sync` so the callback can live inside a
/// shared config and be moved into spawned tasks. All methods have default
/// no-op implementations so callers only override what they care about.
///
/// Attempts are strictly sequential, so events for one run never overlap.
pub trait HarvestProgressCallback: Send + Sync {
    /// Called once after deduplication, before any artifact is attempted.
    ///
    /// # Arguments
    /// * `total_identifiers`: unique identifiers that will be processed
    fn on_run_start(&self, total_identifiers: usize) {
        let _ = total_identifiers;
    }

    /// Called before the store is consulted for an artifact.
    fn on_artifact_start(&self, identifier: &str, kind: ArtifactKind) {
        let _ = (identifier, kind);
    }

    /// Called when an artifact was fetched, validated and written.
    ///
    /// # Arguments
    /// * `bytes`: size of the written file
    fn on_artifact_saved(&self, identifier: &str, kind: ArtifactKind, bytes: u64) {
        let _ = (identifier, kind, bytes);
    }

    /// Called when an artifact already existed and no request was made.
    fn on_artifact_skipped(&self, identifier: &str, kind: ArtifactKind) {
        let _ = (identifier, kind);
    }

    /// Called when an attempt failed.
    ///
    /// # Arguments
    /// * `error`: human-readable failure description
    fn on_artifact_error(&self, identifier: &str, kind: ArtifactKind, error: String) {
        let _ = (identifier, kind, error);
    }

    /// Called right before the pipeline pauses for a cooldown.
    fn on_cooldown(&self, duration: Duration) {
        let _ = duration;
    }

    /// Called once after every identifier has been attempted.
    ///
    /// # Arguments
    /// * `attempts`: artifact attempts made
    /// * `saved`   : artifacts newly written this run
    fn on_run_complete(&self, attempts: usize, saved: usize) {
        let _ = (attempts, saved);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl HarvestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::HarvestConfig`].
pub type ProgressCallback = Arc<dyn HarvestProgressCallback>;
