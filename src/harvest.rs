//! Harvest entry points and the acquisition orchestrator.
//!
//! One run is: search once → dedupe → for each identifier, in order, try the
//! direct PDF and then the rendered capture, pausing after upstream pushback.
//! Nothing runs in parallel. Every attempt failure is recorded and the run
//! moves on; re-running against the same output directory retries exactly
//! the artifacts that are still missing.

use crate::config::HarvestConfig;
use crate::error::{HarvestError, SearchError};
use crate::output::{ArtifactKind, ArtifactResult, FetchOutcome, HarvestReport, HarvestStats};
use crate::pipeline::backoff::{self, BackoffDecision};
use crate::pipeline::normalize::{dedupe, Identifier};
use crate::pipeline::store::ArtifactStore;
use crate::pipeline::{download, render, source};
use crate::progress::HarvestProgressCallback;
use crate::renderer::{ChromiumRenderer, Renderer};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Search, then acquire both artifacts for every reported identifier.
///
/// # Returns
/// `Ok(HarvestReport)` even if every attempt failed, or if the search itself
/// failed (see [`HarvestReport::search_error`]).
///
/// # Errors
/// Only for fatal setup problems: invalid configuration, an output
/// directory that cannot be created, an HTTP client that cannot be built.
///
/// # Example
/// ```rust,no_run
/// use uspto_harvest::{harvest, HarvestConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = HarvestConfig::builder()
///     .access_token(std::env::var("USPTO_ACCESS_TOKEN")?)
///     .build()?;
/// let report = harvest(&config).await?;
/// eprintln!("{} saved, {} failed", report.stats.saved, report.stats.failed);
/// # Ok(())
/// # }
/// ```
pub async fn harvest(config: &HarvestConfig) -> Result<HarvestReport, HarvestError> {
    Harvester::new(config.clone())?.run().await
}

/// Acquire both artifacts for the given identifiers, skipping the search.
///
/// Identifiers are validated and deduplicated like search results.
pub async fn harvest_identifiers<I, S>(
    ids: I,
    config: &HarvestConfig,
) -> Result<HarvestReport, HarvestError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let ids = parse_identifiers(ids)?;
    Harvester::new(config.clone())?.run_identifiers(ids).await
}

/// Synchronous wrapper around [`harvest`].
///
/// Creates a temporary tokio runtime internally.
pub fn harvest_sync(config: &HarvestConfig) -> Result<HarvestReport, HarvestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| HarvestError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(harvest(config))
}

fn parse_identifiers<I, S>(ids: I) -> Result<Vec<Identifier>, HarvestError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ids.into_iter()
        .map(|raw| {
            let raw = raw.as_ref();
            Identifier::new(raw)
                .ok_or_else(|| HarvestError::InvalidConfig(format!("Invalid identifier '{raw}'")))
        })
        .collect()
}

/// Owns everything one run needs: config, HTTP client, store and renderer.
pub struct Harvester {
    config: HarvestConfig,
    client: reqwest::Client,
    store: ArtifactStore,
    renderer: Arc<dyn Renderer>,
}

impl Harvester {
    /// Harvester backed by a headless Chromium.
    pub fn new(config: HarvestConfig) -> Result<Self, HarvestError> {
        let renderer = Arc::new(ChromiumRenderer::from_config(&config));
        Self::with_renderer(config, renderer)
    }

    /// Harvester with a caller-supplied browser backend.
    pub fn with_renderer(
        config: HarvestConfig,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, HarvestError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("uspto-harvest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HarvestError::HttpClient(e.to_string()))?;
        let store = ArtifactStore::new(&config.output_dir);
        Ok(Self {
            config,
            client,
            store,
            renderer,
        })
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Query the identifier source. Duplicates are kept.
    pub async fn search(&self) -> Result<Vec<Identifier>, SearchError> {
        source::fetch_identifiers(&self.client, &self.config).await
    }

    /// Direct PDF for one identifier.
    pub async fn fetch_binary(&self, id: &Identifier) -> FetchOutcome {
        download::fetch_binary(&self.client, &self.store, &self.config, id).await
    }

    /// Rendered capture for one identifier.
    pub async fn capture_rendered(&self, id: &Identifier) -> FetchOutcome {
        render::capture_rendered(self.renderer.as_ref(), &self.store, &self.config, id).await
    }

    /// Full run: search, then [`Harvester::run_identifiers`].
    ///
    /// A failed search yields an empty report carrying the error message.
    pub async fn run(&self) -> Result<HarvestReport, HarvestError> {
        let start = Instant::now();
        let raw = match self.search().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Identifier search failed, nothing to do: {}", e);
                return Ok(HarvestReport {
                    artifacts: Vec::new(),
                    stats: HarvestStats {
                        total_duration_ms: start.elapsed().as_millis() as u64,
                        ..Default::default()
                    },
                    search_error: Some(e.to_string()),
                });
            }
        };
        self.finish(raw, start).await
    }

    /// Dedupe `raw` and acquire both artifacts for each identifier.
    pub async fn run_identifiers(&self, raw: Vec<Identifier>) -> Result<HarvestReport, HarvestError> {
        self.finish(raw, Instant::now()).await
    }

    async fn finish(&self, raw: Vec<Identifier>, start: Instant) -> Result<HarvestReport, HarvestError> {
        let reported = raw.len();
        let ids = dedupe(raw);
        if ids.len() < reported {
            info!("Dropped {} duplicate identifiers", reported - ids.len());
        }

        let artifacts = self.process(&ids).await?;

        let mut stats = HarvestStats {
            identifiers_reported: reported,
            identifiers_unique: ids.len(),
            ..Default::default()
        };
        stats.tally(&artifacts);
        stats.total_duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Harvest complete: {} identifiers, {} saved, {} already present, {} failed, {}ms",
            stats.identifiers_unique,
            stats.saved,
            stats.already_present,
            stats.failed,
            stats.total_duration_ms
        );

        Ok(HarvestReport {
            artifacts,
            stats,
            search_error: None,
        })
    }

    /// Attempt both artifacts for each identifier, strictly in order.
    ///
    /// `ids` is processed as given; deduplicate first.
    pub async fn process(&self, ids: &[Identifier]) -> Result<Vec<ArtifactResult>, HarvestError> {
        self.store.ensure_root().await?;
        let cb = self.config.progress_callback.as_deref();
        if let Some(cb) = cb {
            cb.on_run_start(ids.len());
        }

        let mut results = Vec::with_capacity(ids.len() * 2);
        for id in ids {
            // The rendered capture runs whatever the direct fetch returned.
            for kind in [ArtifactKind::DirectBinary, ArtifactKind::RenderedCapture] {
                results.push(self.attempt(id, kind, cb).await);
            }
        }

        if let Some(cb) = cb {
            let saved = results.iter().filter(|r| r.outcome.is_saved()).count();
            cb.on_run_complete(results.len(), saved);
        }
        Ok(results)
    }

    async fn attempt(
        &self,
        id: &Identifier,
        kind: ArtifactKind,
        cb: Option<&dyn HarvestProgressCallback>,
    ) -> ArtifactResult {
        if let Some(cb) = cb {
            cb.on_artifact_start(id.as_str(), kind);
        }

        let start = Instant::now();
        let outcome = match kind {
            ArtifactKind::DirectBinary => self.fetch_binary(id).await,
            ArtifactKind::RenderedCapture => self.capture_rendered(id).await,
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        report_outcome(id, kind, &outcome, cb);

        let cooled_down = match backoff::decide(kind, &outcome, self.config.cooldown) {
            BackoffDecision::CoolDown(pause) => {
                if let Some(cb) = cb {
                    cb.on_cooldown(pause);
                }
                backoff::cool_down(pause).await;
                true
            }
            BackoffDecision::Proceed => false,
        };

        ArtifactResult {
            identifier: id.to_string(),
            kind,
            outcome,
            duration_ms,
            cooled_down,
        }
    }
}

fn report_outcome(
    id: &Identifier,
    kind: ArtifactKind,
    outcome: &FetchOutcome,
    cb: Option<&dyn HarvestProgressCallback>,
) {
    match outcome {
        FetchOutcome::AlreadyPresent { path } => {
            info!("Already present, skipping {} [{}]: {}", id, kind, path.display());
            if let Some(cb) = cb {
                cb.on_artifact_skipped(id.as_str(), kind);
            }
        }
        FetchOutcome::Saved { path, bytes } => {
            info!("Saved {} [{}]: {} bytes → {}", id, kind, bytes, path.display());
            if let Some(cb) = cb {
                cb.on_artifact_saved(id.as_str(), kind, *bytes);
            }
        }
        FetchOutcome::Failed(e) => {
            warn!("Failed {} [{}]: {}", id, kind, e);
            if let Some(cb) = cb {
                cb.on_artifact_error(id.as_str(), kind, e.to_string());
            }
        }
    }
}
