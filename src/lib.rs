//! # uspto-harvest
//!
//! Resumable bulk retrieval of USPTO patent documents.
//!
//! One run asks the search API for the newest publications and, for every
//! identifier it reports, acquires two artifacts:
//!
//! * the PDF served by the download endpoint (`{id}.pdf`), and
//! * the HTML view rendered to PDF by a headless Chromium (`{id}_html.pdf`).
//!
//! The upstream rate-limits aggressively and drops connections. The pipeline
//! validates everything before it touches the disk, writes atomically, pauses
//! after pushback, and never retries within a run: re-running against the
//! same output directory picks up exactly what is still missing.
//!
//! ## Pipeline Overview
//!
//! ```text
//! search API
//!  │
//!  ├─ 1. Source     one POST, raw identifier list
//!  ├─ 2. Normalize  validate + first-seen dedupe
//!  └─ for each identifier, sequentially:
//!      ├─ 3. Download  GET pdf → status / content-type / size gates → atomic write
//!      ├─ 4. Render    Chromium → observed status + rate-limit body gates → print → atomic write
//!      └─ 5. Backoff   fixed cooldown after 429 / rate-limit body / dropped connection
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use uspto_harvest::{harvest, HarvestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HarvestConfig::builder()
//!         .output_dir("PDFs")
//!         .access_token(std::env::var("USPTO_ACCESS_TOKEN")?)
//!         .build()?;
//!     let report = harvest(&config).await?;
//!     eprintln!("{} saved, {} skipped, {} failed",
//!         report.stats.saved,
//!         report.stats.already_present,
//!         report.stats.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `uspto-harvest` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! uspto-harvest = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod harvest;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod renderer;
pub mod signals;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{HarvestConfig, HarvestConfigBuilder};
pub use error::{BrowserError, FetchError, HarvestError, SearchError};
pub use harvest::{harvest, harvest_identifiers, harvest_sync, Harvester};
pub use output::{ArtifactKind, ArtifactResult, FetchOutcome, HarvestReport, HarvestStats};
pub use pipeline::normalize::Identifier;
pub use progress::{HarvestProgressCallback, NoopProgressCallback, ProgressCallback};
pub use renderer::{ChromiumRenderer, LoadedPage, RenderSession, Renderer};
