//! Chromium-backed renderer using chromiumoxide.
//!
//! Every [`ChromiumRenderer::start`] launches its own browser process and
//! every session is closed after one navigation, so a wedged or crashed
//! browser never carries over to the next identifier.

use super::{is_navigation_response, LoadedPage, RenderSession, Renderer};
use crate::config::HarvestConfig;
use crate::error::BrowserError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, EventResponseReceived};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

const LAUNCH_ARGS: &[&str] = &[
    "--disable-gpu",
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
];

/// How long to wait for the document's response event once `goto` returned.
const STATUS_GRACE: Duration = Duration::from_secs(2);

/// Upper bound on each teardown step.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Launches a headless Chromium per capture.
#[derive(Debug, Clone)]
pub struct ChromiumRenderer {
    executable: Option<PathBuf>,
    request_timeout: Duration,
}

impl ChromiumRenderer {
    pub fn new(executable: Option<PathBuf>, request_timeout: Duration) -> Self {
        Self {
            executable,
            request_timeout,
        }
    }

    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(
            config.chrome_executable.clone(),
            Duration::from_secs(config.page_load_timeout_secs),
        )
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn start(&self) -> Result<Box<dyn RenderSession>, BrowserError> {
        // Located lazily so runs where every capture already exists need no browser.
        let executable = chromium_auto::ensure_chromium(self.executable.as_deref())
            .map_err(|e| BrowserError::NotFound(e.to_string()))?;
        debug!("Launching {}", executable.display());

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .request_timeout(self.request_timeout);
        for arg in LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler: {e}");
                }
            }
        });

        Ok(Box::new(ChromiumSession {
            browser: Some(browser),
            handler_task,
            page: None,
            status_task: None,
        }))
    }
}

struct ChromiumSession {
    browser: Option<Browser>,
    handler_task: JoinHandle<()>,
    page: Option<Page>,
    status_task: Option<JoinHandle<()>>,
}

fn protocol(e: chromiumoxide::error::CdpError) -> BrowserError {
    BrowserError::Protocol(e.to_string())
}

/// `scheme://host/path` without the query, which carries the access token.
fn redact_url(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(mut u) => {
            u.set_query(None);
            u.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}

#[async_trait]
impl RenderSession for ChromiumSession {
    async fn load(&mut self, url: &str, timeout: Duration) -> Result<LoadedPage, BrowserError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| BrowserError::Protocol("session already closed".into()))?;

        let page = browser.new_page("about:blank").await.map_err(protocol)?;
        self.page = Some(page.clone());

        page.execute(EnableParams::default())
            .await
            .map_err(protocol)?;

        // Subscribe before navigating; the document response arrives during goto.
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(protocol)?;
        let (status_tx, status_rx) = oneshot::channel::<i64>();
        let target = url.to_string();
        self.status_task = Some(tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                if is_navigation_response(&event.response.url, &target) {
                    let _ = status_tx.send(event.response.status);
                    return;
                }
            }
        }));

        let navigate = async {
            page.goto(url).await?;
            page.find_element("body").await?;
            page.content().await
        };
        let html = match tokio::time::timeout(timeout, navigate).await {
            Ok(Ok(html)) => html,
            Ok(Err(e)) => return Err(protocol(e)),
            Err(_) => {
                return Err(BrowserError::Timeout {
                    url: redact_url(url),
                    secs: timeout.as_secs(),
                })
            }
        };

        let status = match tokio::time::timeout(STATUS_GRACE, status_rx).await {
            Ok(Ok(code)) => u16::try_from(code).ok(),
            _ => None,
        };
        debug!(
            "Loaded {} (status {:?}, {} bytes of HTML)",
            redact_url(url),
            status,
            html.len()
        );

        Ok(LoadedPage { status, html })
    }

    async fn print_pdf(&mut self) -> Result<Vec<u8>, BrowserError> {
        let page = self
            .page
            .as_ref()
            .ok_or_else(|| BrowserError::Print("no page loaded".into()))?;
        let params = PrintToPdfParams {
            print_background: Some(false),
            ..Default::default()
        };
        page.pdf(params)
            .await
            .map_err(|e| BrowserError::Print(e.to_string()))
    }

    async fn close(self: Box<Self>) {
        let mut this = self;
        if let Some(task) = this.status_task.take() {
            task.abort();
        }
        if let Some(page) = this.page.take() {
            match tokio::time::timeout(TEARDOWN_TIMEOUT, page.close()).await {
                Ok(Err(e)) => debug!("Page close: {e}"),
                Err(_) => debug!("Page close timed out"),
                Ok(Ok(())) => {}
            }
        }
        if let Some(mut browser) = this.browser.take() {
            match tokio::time::timeout(TEARDOWN_TIMEOUT, browser.close()).await {
                Ok(Err(e)) => debug!("Browser close: {e}"),
                Err(_) => debug!("Browser close timed out"),
                Ok(Ok(_)) => {}
            }
            match tokio::time::timeout(TEARDOWN_TIMEOUT, browser.wait()).await {
                Ok(Err(e)) => debug!("Browser wait: {e}"),
                Err(_) => debug!("Browser did not exit in time"),
                Ok(Ok(_)) => {}
            }
        }
        this.handler_task.abort();
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        // Reached without close() only on panic or cancellation.
        if let Some(task) = self.status_task.take() {
            task.abort();
        }
        self.handler_task.abort();
    }
}
