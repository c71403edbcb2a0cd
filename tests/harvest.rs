//! Integration tests for uspto-harvest.
//!
//! HTTP endpoints are served by `wiremock` and the browser is replaced by a
//! scripted [`Renderer`], so everything except the last test runs offline
//! without Chromium. That last test drives a real headless Chromium and is
//! gated behind `E2E_ENABLED`.
//!
//! Run with:
//!   cargo test --test harvest
//!
//! Live browser test:
//!   E2E_ENABLED=1 cargo test --test harvest -- --ignored --nocapture

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uspto_harvest::{
    ArtifactKind, BrowserError, ChromiumRenderer, FetchError, FetchOutcome, HarvestConfig,
    HarvestProgressCallback, Harvester, Identifier, LoadedPage, RenderSession, Renderer,
};
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PDF_BODY: &[u8] = b"%PDF-1.7\n1 0 obj <<>> endobj\n%%EOF\n";

// ── Scripted browser ─────────────────────────────────────────────────────────

#[derive(Clone)]
enum Script {
    /// Navigation succeeds with this status and HTML; printing yields `pdf`.
    Page {
        status: Option<u16>,
        html: String,
        pdf: Vec<u8>,
    },
    /// Navigation fails with this error text.
    LoadError(String),
}

impl Script {
    fn ok() -> Self {
        Script::Page {
            status: Some(200),
            html: "<html><body><h1>Claims</h1></body></html>".into(),
            pdf: b"%PDF-1.4 rendered".to_vec(),
        }
    }

    fn page(status: u16, html: &str) -> Self {
        Script::Page {
            status: Some(status),
            html: html.into(),
            pdf: b"%PDF-1.4 rendered".to_vec(),
        }
    }
}

#[derive(Default)]
struct Counters {
    launches: AtomicUsize,
    closes: AtomicUsize,
    prints: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

struct FakeRenderer {
    script: Script,
    counters: Arc<Counters>,
}

impl FakeRenderer {
    fn new(script: Script) -> (Arc<Self>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let renderer = Arc::new(Self {
            script,
            counters: Arc::clone(&counters),
        });
        (renderer, counters)
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn start(&self) -> Result<Box<dyn RenderSession>, BrowserError> {
        self.counters.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            script: self.script.clone(),
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct FakeSession {
    script: Script,
    counters: Arc<Counters>,
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn load(&mut self, url: &str, _timeout: Duration) -> Result<LoadedPage, BrowserError> {
        self.counters.urls.lock().unwrap().push(url.to_string());
        match &self.script {
            Script::Page { status, html, .. } => Ok(LoadedPage {
                status: *status,
                html: html.clone(),
            }),
            Script::LoadError(text) => Err(BrowserError::Protocol(text.clone())),
        }
    }

    async fn print_pdf(&mut self) -> Result<Vec<u8>, BrowserError> {
        self.counters.prints.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Page { pdf, .. } => Ok(pdf.clone()),
            Script::LoadError(text) => Err(BrowserError::Print(text.clone())),
        }
    }

    async fn close(self: Box<Self>) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Progress tracking ────────────────────────────────────────────────────────

#[derive(Default)]
struct Events {
    cooldowns: AtomicUsize,
    saved: AtomicUsize,
    skipped: AtomicUsize,
    errors: AtomicUsize,
    order: Mutex<Vec<String>>,
}

impl HarvestProgressCallback for Events {
    fn on_artifact_start(&self, identifier: &str, kind: ArtifactKind) {
        self.order.lock().unwrap().push(format!("{identifier}:{kind}"));
    }
    fn on_artifact_saved(&self, _identifier: &str, _kind: ArtifactKind, _bytes: u64) {
        self.saved.fetch_add(1, Ordering::SeqCst);
    }
    fn on_artifact_skipped(&self, _identifier: &str, _kind: ArtifactKind) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }
    fn on_artifact_error(&self, _identifier: &str, _kind: ArtifactKind, _error: String) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_cooldown(&self, _duration: Duration) {
        self.cooldowns.fetch_add(1, Ordering::SeqCst);
        self.order.lock().unwrap().push("cooldown".into());
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Route library logs to the test harness; filter with `RUST_LOG`.
fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config(server: &MockServer, out: &Path, events: Option<Arc<Events>>) -> HarvestConfig {
    init_logs();
    let mut builder = HarvestConfig::builder()
        .output_dir(out)
        .access_token("test-token")
        .search_url(format!("{}/api/searches/generic", server.uri()))
        .pdf_url_base(format!("{}/api/pdf/downloadPdf", server.uri()))
        .html_url_base(format!("{}/api/patents/html", server.uri()))
        .cooldown(Duration::from_millis(10))
        .download_timeout_secs(5)
        .page_load_timeout_secs(5);
    if let Some(events) = events {
        builder = builder.progress_callback(events as Arc<dyn HarvestProgressCallback>);
    }
    builder.build().unwrap()
}

fn id(s: &str) -> Identifier {
    Identifier::new(s).unwrap()
}

fn pdf_response() -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/pdf")
        .set_body_bytes(PDF_BODY.to_vec())
}

fn search_body(ids: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "numFound": ids.len(),
        "docs": ids
            .iter()
            .map(|i| serde_json::json!({ "patentNumber": i, "title": "A widget" }))
            .collect::<Vec<_>>()
    })
}

fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ── End-to-end scenario ──────────────────────────────────────────────────────

#[tokio::test]
async fn search_dedupes_and_attempts_each_artifact_once() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/api/searches/generic"))
        .and(header("x-access-token", "test-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(search_body(&["US-1", "US-2", "US-1"])),
        )
        .expect(2)
        .mount(&server)
        .await;
    // Two downloads on the first run, none on the second.
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/pdf/downloadPdf/US-[12]$"))
        .respond_with(pdf_response())
        .expect(2)
        .mount(&server)
        .await;

    let events = Arc::new(Events::default());
    let (renderer, browser) = FakeRenderer::new(Script::ok());
    let harvester =
        Harvester::with_renderer(config(&server, out.path(), Some(events.clone())), renderer)
            .unwrap();

    let report = harvester.run().await.unwrap();

    assert!(report.search_error.is_none());
    assert_eq!(report.stats.identifiers_reported, 3);
    assert_eq!(report.stats.identifiers_unique, 2);
    assert_eq!(report.stats.attempts, 4);
    assert_eq!(report.stats.saved, 4);
    assert_eq!(report.stats.cooldowns, 0);

    let attempted: Vec<(String, ArtifactKind)> = report
        .artifacts
        .iter()
        .map(|a| (a.identifier.clone(), a.kind))
        .collect();
    assert_eq!(
        attempted,
        vec![
            ("US-1".to_string(), ArtifactKind::DirectBinary),
            ("US-1".to_string(), ArtifactKind::RenderedCapture),
            ("US-2".to_string(), ArtifactKind::DirectBinary),
            ("US-2".to_string(), ArtifactKind::RenderedCapture),
        ]
    );
    assert_eq!(
        dir_entries(out.path()),
        vec!["US-1.pdf", "US-1_html.pdf", "US-2.pdf", "US-2_html.pdf"]
    );
    assert_eq!(std::fs::read(out.path().join("US-1.pdf")).unwrap(), PDF_BODY);
    assert_eq!(browser.launches.load(Ordering::SeqCst), 2);
    assert_eq!(browser.closes.load(Ordering::SeqCst), 2);

    let urls = browser.urls.lock().unwrap().clone();
    assert!(urls[0].ends_with("/api/patents/html/US-1?source=US-PGPUB&requestToken=test-token"));

    // Second run: everything is present, no downloads, no browser.
    let again = harvester.run().await.unwrap();
    assert_eq!(again.stats.attempts, 4);
    assert_eq!(again.stats.already_present, 4);
    assert_eq!(again.stats.saved, 0);
    assert_eq!(browser.launches.load(Ordering::SeqCst), 2);
    assert_eq!(events.skipped.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn failed_search_is_an_empty_run() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (renderer, browser) = FakeRenderer::new(Script::ok());
    let harvester = Harvester::with_renderer(config(&server, out.path(), None), renderer).unwrap();
    let report = harvester.run().await.unwrap();

    let err = report.search_error.expect("search error recorded");
    assert!(err.contains("503"), "got: {err}");
    assert!(report.artifacts.is_empty());
    assert_eq!(browser.launches.load(Ordering::SeqCst), 0);
}

// ── Resumability ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn direct_fetch_second_call_makes_no_request() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();
    Mock::given(method("GET"))
        .and(path("/api/pdf/downloadPdf/US-7"))
        .respond_with(pdf_response())
        .expect(1)
        .mount(&server)
        .await;

    let (renderer, _) = FakeRenderer::new(Script::ok());
    let harvester = Harvester::with_renderer(config(&server, out.path(), None), renderer).unwrap();

    assert!(harvester.fetch_binary(&id("US-7")).await.is_saved());
    assert!(harvester.fetch_binary(&id("US-7")).await.is_already_present());
}

#[tokio::test]
async fn rendered_capture_second_call_starts_no_browser() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();
    let (renderer, browser) = FakeRenderer::new(Script::ok());
    let harvester = Harvester::with_renderer(config(&server, out.path(), None), renderer).unwrap();

    let first = harvester.capture_rendered(&id("US-8")).await;
    assert!(matches!(first, FetchOutcome::Saved { bytes, .. } if bytes > 0));
    let second = harvester.capture_rendered(&id("US-8")).await;
    assert!(second.is_already_present());

    assert_eq!(browser.launches.load(Ordering::SeqCst), 1);
    assert_eq!(browser.closes.load(Ordering::SeqCst), 1);
}

// ── Rendered capture gates ───────────────────────────────────────────────────

#[tokio::test]
async fn rate_limit_body_behind_200_writes_nothing() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();
    let (renderer, browser) = FakeRenderer::new(Script::page(
        200,
        r#"<html><body><pre>{"status":429,"message":"Too Many Requests"}</pre></body></html>"#,
    ));
    let harvester = Harvester::with_renderer(config(&server, out.path(), None), renderer).unwrap();

    let outcome = harvester.capture_rendered(&id("US-9")).await;

    assert!(outcome.error().unwrap().is_rate_limited(), "got: {outcome:?}");
    assert!(!out.path().join("US-9_html.pdf").exists());
    assert_eq!(browser.prints.load(Ordering::SeqCst), 0);
    assert_eq!(browser.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn status_404_writes_nothing() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();
    let (renderer, browser) = FakeRenderer::new(Script::page(404, "<html><body>Claims</body></html>"));
    let harvester = Harvester::with_renderer(config(&server, out.path(), None), renderer).unwrap();

    let outcome = harvester.capture_rendered(&id("US-10")).await;

    assert_eq!(outcome.error(), Some(&FetchError::BadStatus { status: 404 }));
    assert!(!out.path().join("US-10_html.pdf").exists());
    assert_eq!(browser.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_print_writes_nothing() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();
    let (renderer, _) = FakeRenderer::new(Script::Page {
        status: Some(200),
        html: "<html><body>ok</body></html>".into(),
        pdf: Vec::new(),
    });
    let harvester = Harvester::with_renderer(config(&server, out.path(), None), renderer).unwrap();

    let outcome = harvester.capture_rendered(&id("US-11")).await;

    assert_eq!(outcome.error(), Some(&FetchError::EmptyBody));
    assert!(dir_entries(out.path()).is_empty());
}

// ── Backoff ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn direct_429_cools_down_exactly_once() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();
    Mock::given(method("GET"))
        .and(path("/api/pdf/downloadPdf/US-1"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/pdf/downloadPdf/US-2"))
        .respond_with(pdf_response())
        .mount(&server)
        .await;

    let events = Arc::new(Events::default());
    let (renderer, _) = FakeRenderer::new(Script::ok());
    let harvester =
        Harvester::with_renderer(config(&server, out.path(), Some(events.clone())), renderer)
            .unwrap();

    let results = harvester.process(&[id("US-1"), id("US-2")]).await.unwrap();

    assert_eq!(results.len(), 4);
    assert!(results[0].outcome.error().unwrap().is_rate_limited());
    assert!(results[0].cooled_down);
    assert!(results[1..].iter().all(|r| !r.cooled_down));
    assert_eq!(events.cooldowns.load(Ordering::SeqCst), 1);
    // The pause comes right after the rate-limited attempt.
    let order = events.order.lock().unwrap().clone();
    assert_eq!(order[..2], ["US-1:pdf".to_string(), "cooldown".to_string()]);
    // The rendered capture still ran for the throttled identifier.
    assert!(out.path().join("US-1_html.pdf").exists());
    assert!(!out.path().join("US-1.pdf").exists());
}

#[tokio::test]
async fn ordinary_failures_do_not_cool_down() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let events = Arc::new(Events::default());
    let (renderer, _) = FakeRenderer::new(Script::page(500, "<html><body>error</body></html>"));
    let harvester =
        Harvester::with_renderer(config(&server, out.path(), Some(events.clone())), renderer)
            .unwrap();

    let results = harvester.process(&[id("US-1"), id("US-2")]).await.unwrap();

    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.outcome.error().is_some()));
    assert_eq!(events.errors.load(Ordering::SeqCst), 4);
    assert_eq!(events.cooldowns.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dropped_browser_connection_cools_down() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();
    Mock::given(method("GET"))
        .respond_with(pdf_response())
        .mount(&server)
        .await;

    let events = Arc::new(Events::default());
    let (renderer, browser) = FakeRenderer::new(Script::LoadError(
        "net::ERR_CONNECTION_RESET at https://ppubs.uspto.gov".into(),
    ));
    let harvester =
        Harvester::with_renderer(config(&server, out.path(), Some(events.clone())), renderer)
            .unwrap();

    let results = harvester.process(&[id("US-3")]).await.unwrap();

    assert!(results[0].outcome.is_saved());
    let rendered = &results[1];
    assert!(matches!(
        rendered.outcome.error(),
        Some(FetchError::NavigationFailed { .. })
    ));
    assert!(rendered.cooled_down);
    assert_eq!(events.cooldowns.load(Ordering::SeqCst), 1);
    assert_eq!(browser.closes.load(Ordering::SeqCst), 1);
}

// ── Live browser ─────────────────────────────────────────────────────────────

#[tokio::test]
#[ignore] // Requires Chromium to be installed
async fn chromium_captures_served_page() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run the live browser test");
        return;
    }

    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();
    Mock::given(method("GET"))
        .and(path("/api/patents/html/US-42"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string("<html><body><h1>US-42</h1><p>A widget.</p></body></html>"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/patents/html/US-43"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(r#"<html><body><pre>{"message":"Too Many Requests"}</pre></body></html>"#),
        )
        .mount(&server)
        .await;

    let cfg = config(&server, out.path(), None);
    let renderer = Arc::new(ChromiumRenderer::from_config(&cfg));
    let harvester = Harvester::with_renderer(cfg, renderer).unwrap();

    let saved = harvester.capture_rendered(&id("US-42")).await;
    assert!(saved.is_saved(), "got: {saved:?}");
    let bytes = std::fs::read(out.path().join("US-42_html.pdf")).unwrap();
    assert!(bytes.starts_with(b"%PDF"));

    let throttled = harvester.capture_rendered(&id("US-43")).await;
    assert!(throttled.error().unwrap().is_rate_limited(), "got: {throttled:?}");
    assert!(!out.path().join("US-43_html.pdf").exists());
}
