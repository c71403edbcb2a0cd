//! CLI binary for uspto-harvest.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `HarvestConfig` and prints one outcome line per attempt.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use uspto_harvest::{
    harvest, harvest_identifiers, ArtifactKind, HarvestConfig, HarvestProgressCallback,
    HarvestReport, ProgressCallback,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a progress bar over all attempts plus one
/// log line per finished attempt.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the in-flight attempt, keyed by `(identifier, kind)`.
    start_times: Mutex<HashMap<(String, ArtifactKind), Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` reports how many identifiers there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Searching");
        bar.set_message("Querying the search API…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, attempts: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} artifacts  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(attempts as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Harvesting");
        self.bar.set_message("");
    }

    fn elapsed(&self, identifier: &str, kind: ArtifactKind) -> String {
        let ms = self
            .start_times
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&(identifier.to_string(), kind))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }
}

impl HarvestProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_identifiers: usize) {
        self.activate_bar(total_identifiers * 2);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Harvesting {total_identifiers} documents…"))
        ));
    }

    fn on_artifact_start(&self, identifier: &str, kind: ArtifactKind) {
        self.start_times
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert((identifier.to_string(), kind), Instant::now());
        self.bar.set_message(format!("{identifier} [{kind}]"));
    }

    fn on_artifact_saved(&self, identifier: &str, kind: ArtifactKind, bytes: u64) {
        self.bar.println(format!(
            "  {} {:<24} {:<4}  {:<14}  {}",
            green("✓"),
            identifier,
            kind,
            dim(&format!("{bytes:>9} bytes")),
            self.elapsed(identifier, kind),
        ));
        self.bar.inc(1);
    }

    fn on_artifact_skipped(&self, identifier: &str, kind: ArtifactKind) {
        self.bar.println(format!(
            "  {} {:<24} {:<4}  {}",
            dim("↷"),
            identifier,
            kind,
            dim("already present"),
        ));
        self.start_times
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&(identifier.to_string(), kind));
        self.bar.inc(1);
    }

    fn on_artifact_error(&self, identifier: &str, kind: ArtifactKind, error: String) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error
        };

        self.bar.println(format!(
            "  {} {:<24} {:<4}  {}  {}",
            red("✗"),
            identifier,
            kind,
            red(&msg),
            self.elapsed(identifier, kind),
        ));
        self.bar.inc(1);
    }

    fn on_cooldown(&self, duration: Duration) {
        self.bar.println(format!(
            "  {} {}",
            yellow("⏸"),
            yellow(&format!("upstream pushback, pausing {}s", duration.as_secs()))
        ));
        self.bar.set_message(format!("cooling down {}s", duration.as_secs()));
    }

    fn on_run_complete(&self, attempts: usize, saved: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        let skipped = attempts.saturating_sub(saved + failed);

        eprintln!(
            "{} {} saved, {} already present, {} failed",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            bold(&saved.to_string()),
            skipped,
            if failed == 0 {
                failed.to_string()
            } else {
                red(&failed.to_string())
            },
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Newest 100 publications into ./PDFs (resumes where the last run stopped)
  uspto-harvest

  # Smaller batch into a custom directory
  uspto-harvest --batch-size 20 --output-dir /data/patents

  # Specific documents, no search
  uspto-harvest US-11734097-B1 US-20240001234-A1

  # JSON report for scripting
  uspto-harvest --json > report.json

OUTPUT FILES:
  {output-dir}/{id}.pdf        PDF from the download endpoint
  {output-dir}/{id}_html.pdf   HTML view printed to PDF by headless Chromium

  A file's presence means it is complete; it is never re-fetched. Failed
  attempts leave no file and are retried on the next run.

ENVIRONMENT VARIABLES:
  USPTO_ACCESS_TOKEN          Access token for the search and download APIs
  HARVEST_OUTPUT_DIR          Output directory (default: PDFs)
  HARVEST_BATCH_SIZE          Search batch size (default: 100)
  HARVEST_COOLDOWN_SECS       Pause after rate limiting (default: 60)
  HARVEST_CHROME_PATH         Chrome/Chromium executable
  HARVEST_CHROMIUM_CACHE_DIR  Where an unpacked Chrome for Testing is looked up
  RUST_LOG                    Overrides the log filter (e.g. uspto_harvest=debug)
"#;

/// Bulk, resumable retrieval of USPTO patent PDFs and rendered HTML captures.
#[derive(Parser, Debug)]
#[command(
    name = "uspto-harvest",
    version,
    about = "Bulk, resumable retrieval of USPTO patent PDFs and rendered HTML captures",
    long_about = "Queries the USPTO search API for the newest publications and saves, for each \
one, the PDF from the download endpoint and a PDF print of the HTML view rendered by headless \
Chromium. Re-running skips everything already on disk.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document identifiers to fetch instead of running the search.
    identifiers: Vec<String>,

    /// Directory the artifacts are written to.
    #[arg(short, long, env = "HARVEST_OUTPUT_DIR", default_value = "PDFs")]
    output_dir: PathBuf,

    /// Access token for the USPTO APIs.
    #[arg(long, env = "USPTO_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Number of records requested from the search.
    #[arg(short, long, env = "HARVEST_BATCH_SIZE", default_value_t = 100,
          value_parser = clap::value_parser!(u32).range(1..))]
    batch_size: u32,

    /// Pause after a rate-limit or dropped-connection signal, in seconds.
    #[arg(long, env = "HARVEST_COOLDOWN_SECS", default_value_t = 60)]
    cooldown_secs: u64,

    /// Search request timeout in seconds.
    #[arg(long, env = "HARVEST_SEARCH_TIMEOUT", default_value_t = 60)]
    search_timeout: u64,

    /// Direct PDF download timeout in seconds.
    #[arg(long, env = "HARVEST_DOWNLOAD_TIMEOUT", default_value_t = 180)]
    download_timeout: u64,

    /// Browser page-load timeout in seconds.
    #[arg(long, env = "HARVEST_PAGE_TIMEOUT", default_value_t = 180)]
    page_timeout: u64,

    /// Chrome/Chromium executable (auto-detected if unset).
    #[arg(long, env = "HARVEST_CHROME_PATH")]
    chrome: Option<PathBuf>,

    /// Exact, case-sensitive text marking a rate-limited HTML response.
    #[arg(long, env = "HARVEST_RATE_LIMIT_MARKER")]
    rate_limit_marker: Option<String>,

    /// Override the search endpoint.
    #[arg(long, env = "HARVEST_SEARCH_URL", hide = true)]
    search_url: Option<String>,

    /// Override the PDF download endpoint.
    #[arg(long, env = "HARVEST_PDF_URL", hide = true)]
    pdf_url: Option<String>,

    /// Override the HTML view endpoint.
    #[arg(long, env = "HARVEST_HTML_URL", hide = true)]
    html_url: Option<String>,

    /// Print the full run report as JSON on stdout.
    #[arg(long, env = "HARVEST_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "HARVEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "HARVEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "HARVEST_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar prints the per-attempt lines, so library INFO logs
    // would only duplicate them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let cli_cb = show_progress.then(CliProgressCallback::new_dynamic);
    let progress_cb: Option<ProgressCallback> = cli_cb
        .clone()
        .map(|cb| cb as Arc<dyn HarvestProgressCallback>);

    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let report = if cli.identifiers.is_empty() {
        harvest(&config).await.context("Harvest failed")?
    } else {
        harvest_identifiers(&cli.identifiers, &config)
            .await
            .context("Harvest failed")?
    };
    // A failed search never reaches on_run_start, so the spinner is still live.
    if let Some(cb) = cli_cb {
        cb.bar.finish_and_clear();
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    }

    if !cli.quiet {
        print_summary(&report, show_progress);
    }

    Ok(())
}

/// Map CLI args to `HarvestConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<HarvestConfig> {
    let mut builder = HarvestConfig::builder()
        .output_dir(&cli.output_dir)
        .batch_size(cli.batch_size as usize)
        .cooldown(Duration::from_secs(cli.cooldown_secs))
        .search_timeout_secs(cli.search_timeout)
        .download_timeout_secs(cli.download_timeout)
        .page_load_timeout_secs(cli.page_timeout);

    if let Some(ref token) = cli.token {
        builder = builder.access_token(token);
    }
    if let Some(ref chrome) = cli.chrome {
        builder = builder.chrome_executable(chrome);
    }
    if let Some(ref marker) = cli.rate_limit_marker {
        builder = builder.rate_limit_marker(marker);
    }
    if let Some(ref url) = cli.search_url {
        builder = builder.search_url(url);
    }
    if let Some(ref url) = cli.pdf_url {
        builder = builder.pdf_url_base(url);
    }
    if let Some(ref url) = cli.html_url {
        builder = builder.html_url_base(url);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(report: &HarvestReport, progress_shown: bool) {
    if let Some(ref err) = report.search_error {
        eprintln!("{} {}", yellow("⚠"), yellow(&format!("Search failed, nothing to do: {err}")));
        return;
    }
    let stats = &report.stats;
    if stats.identifiers_reported > stats.identifiers_unique {
        eprintln!(
            "   {} duplicate identifiers dropped",
            dim(&(stats.identifiers_reported - stats.identifiers_unique).to_string())
        );
    }
    // The progress callback already printed the saved / failed line.
    if !progress_shown {
        eprintln!(
            "Harvested {} documents: {} saved, {} already present, {} failed",
            stats.identifiers_unique, stats.saved, stats.already_present, stats.failed
        );
    }
    eprintln!(
        "   {} cooldowns, {}ms total",
        dim(&stats.cooldowns.to_string()),
        stats.total_duration_ms,
    );
}
