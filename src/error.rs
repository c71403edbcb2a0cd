//! Error types for the uspto-harvest library.
//!
//! Three tiers reflect three distinct failure scopes:
//!
//! * [`HarvestError`] (**fatal**): the run cannot proceed at all (invalid
//!   configuration, output directory cannot be created, HTTP client cannot be
//!   built). Returned as `Err(HarvestError)` from the top-level `harvest*`
//!   functions.
//!
//! * [`SearchError`] (**recoverable**): the identifier search failed. The run
//!   treats it as "nothing to do" and records the message in
//!   [`crate::output::HarvestReport::search_error`].
//!
//! * [`FetchError`] (**non-fatal**): one artifact attempt failed (bad status,
//!   wrong content type, rate limited, browser crash). Stored inside
//!   [`crate::output::FetchOutcome::Failed`]; the run always moves on to the
//!   next attempt.
//!
//! [`BrowserError`] is internal plumbing of the rendered capture path and is
//! folded into [`FetchError::NavigationFailed`] with its text preserved.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the uspto-harvest library.
#[derive(Debug, Error)]
pub enum HarvestError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the artifact output directory.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── HTTP errors ───────────────────────────────────────────────────────
    /// The reqwest client could not be constructed (TLS backend etc.).
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The identifier search could not produce a usable result.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// The request could not be sent or the body could not be read.
    #[error("Search request to '{url}' failed: {reason}")]
    Transport { url: String, reason: String },

    /// The search endpoint answered with a non-success status.
    #[error("Search request to '{url}' returned HTTP {status}")]
    BadStatus { url: String, status: u16 },

    /// The body was not the JSON shape we expect.
    #[error("Search response could not be parsed: {0}")]
    Parse(String),
}

/// A non-fatal error for a single artifact attempt.
///
/// Stored in [`crate::output::FetchOutcome::Failed`]. No partial file is ever
/// left behind when one of these is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum FetchError {
    /// The request could not be sent or the response body could not be read.
    #[error("transport error: {detail}")]
    Transport { detail: String },

    /// The response status was not exactly 200 OK.
    #[error("unexpected HTTP status {status}")]
    BadStatus { status: u16 },

    /// The response declared something other than a PDF.
    #[error("invalid content type '{content_type}' (expected application/pdf)")]
    BadContentType { content_type: String },

    /// The response body was empty; writing it would fake a completed artifact.
    #[error("downloaded 0 bytes, not creating file")]
    EmptyBody,

    /// The artifact could not be persisted.
    #[error("failed to write artifact: {detail}")]
    WriteFailed { detail: String },

    /// Upstream signalled rate limiting (HTTP 429 or the rate-limit body text).
    #[error("rate limited by upstream: {detail}")]
    RateLimited { detail: String },

    /// The browser could not load or render the page.
    #[error("navigation failed: {detail}")]
    NavigationFailed { detail: String },

    /// The page loaded but a capture precondition did not hold.
    #[error("render gate failed: {reason}")]
    RenderGateFailed { reason: String },
}

impl FetchError {
    /// Whether this failure is upstream rate limiting.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited { .. })
    }

    /// Whether this failure carries a forcibly-closed connection signal.
    pub fn is_connection_closed(&self) -> bool {
        match self {
            FetchError::NavigationFailed { detail } | FetchError::Transport { detail } => {
                crate::signals::is_connection_closed(detail)
            }
            _ => false,
        }
    }
}

/// Failures of the headless browser control surface.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The browser executable could not be located.
    #[error("browser not available: {0}")]
    NotFound(String),

    /// The browser process failed to start.
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// A DevTools command on the page failed.
    #[error("{0}")]
    Protocol(String),

    /// Navigation did not finish within the page-load timeout.
    #[error("navigation to '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// Printing the page to PDF failed.
    #[error("print to PDF failed: {0}")]
    Print(String),
}

/// Render an error with its whole `source()` chain, `outer: inner: root`.
///
/// reqwest keeps the interesting part ("connection reset by peer") several
/// levels down, and the connection-closed check needs to see it.
pub(crate) fn error_chain(e: &dyn std::error::Error) -> String {
    let mut text = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        let inner_text = inner.to_string();
        if !text.contains(&inner_text) {
            text.push_str(": ");
            text.push_str(&inner_text);
        }
        source = inner.source();
    }
    text
}

impl From<BrowserError> for FetchError {
    fn from(e: BrowserError) -> Self {
        FetchError::NavigationFailed {
            detail: e.to_string(),
        }
    }
}
