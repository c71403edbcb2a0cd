//! Result types produced by a harvest run.
//!
//! Everything here is `Serialize` so the CLI can emit the whole
//! [`HarvestReport`] as JSON, and nothing here is ever persisted by the
//! library itself: the only durable state is the artifact files on disk.

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The two artifacts acquired for every identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// The PDF served directly by the download endpoint.
    DirectBinary,
    /// The HTML view printed to PDF by a headless browser.
    RenderedCapture,
}

impl ArtifactKind {
    /// File-name suffix appended to the identifier, extension included.
    pub fn file_suffix(self) -> &'static str {
        match self {
            ArtifactKind::DirectBinary => ".pdf",
            ArtifactKind::RenderedCapture => "_html.pdf",
        }
    }

    /// Short label for log lines.
    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::DirectBinary => "pdf",
            ArtifactKind::RenderedCapture => "html",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What one acquisition attempt ended with.
///
/// Tagged with `result`; a failure's own fields (including the HTTP `status`
/// of [`FetchError::BadStatus`]) sit next to it in the same JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// The artifact was already on disk; no network activity happened.
    AlreadyPresent { path: PathBuf },
    /// The artifact was fetched, validated and written in full.
    Saved { path: PathBuf, bytes: u64 },
    /// The attempt failed; nothing was written.
    Failed(FetchError),
}

impl FetchOutcome {
    /// The classified failure, if any.
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            FetchOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, FetchOutcome::Saved { .. })
    }

    pub fn is_already_present(&self) -> bool {
        matches!(self, FetchOutcome::AlreadyPresent { .. })
    }
}

/// One attempt for one (identifier, kind) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactResult {
    pub identifier: String,
    pub kind: ArtifactKind,
    pub outcome: FetchOutcome,
    /// Wall-clock time spent on the attempt, excluding any cooldown.
    pub duration_ms: u64,
    /// Whether this outcome triggered the cooldown pause.
    pub cooled_down: bool,
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestStats {
    /// Identifiers the search reported, duplicates included.
    pub identifiers_reported: usize,
    /// Identifiers left after deduplication.
    pub identifiers_unique: usize,
    /// Artifact attempts made (two per identifier).
    pub attempts: usize,
    pub saved: usize,
    pub already_present: usize,
    pub failed: usize,
    /// Number of cooldown pauses taken.
    pub cooldowns: usize,
    pub total_duration_ms: u64,
}

impl HarvestStats {
    /// Recompute the outcome counters from a list of attempts.
    pub(crate) fn tally(&mut self, artifacts: &[ArtifactResult]) {
        self.attempts = artifacts.len();
        self.saved = artifacts.iter().filter(|a| a.outcome.is_saved()).count();
        self.already_present = artifacts
            .iter()
            .filter(|a| a.outcome.is_already_present())
            .count();
        self.failed = artifacts
            .iter()
            .filter(|a| a.outcome.error().is_some())
            .count();
        self.cooldowns = artifacts.iter().filter(|a| a.cooled_down).count();
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarvestReport {
    /// Attempts in the order they were made.
    pub artifacts: Vec<ArtifactResult>,
    pub stats: HarvestStats,
    /// Set when the identifier search failed and the run did nothing.
    pub search_error: Option<String>,
}
