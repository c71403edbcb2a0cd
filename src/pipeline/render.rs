//! Rendered capture engine: load the HTML view in a headless browser and
//! print it to PDF, but only when the page is known to be the real document.
//!
//! ## Why two gates?
//!
//! A throttled request can come back as HTTP 200 whose body is a JSON error
//! payload. Status alone would happily print that error page and the store
//! would then treat it as complete forever. So capture requires both:
//!
//! 1. the browser-observed status of the navigation response is exactly 200
//! 2. the rendered HTML does not contain the rate-limit marker
//!
//! The status comes from the browser's own network events, not a second
//! request, so it describes exactly what was loaded and costs no extra quota.

use crate::config::HarvestConfig;
use crate::error::FetchError;
use crate::output::{ArtifactKind, FetchOutcome};
use crate::pipeline::normalize::Identifier;
use crate::pipeline::store::ArtifactStore;
use crate::renderer::{LoadedPage, RenderSession, Renderer};
use crate::signals;
use std::time::Duration;
use tracing::debug;

/// Acquire the rendered capture for `id`.
///
/// The browser session is closed on every path once started.
pub async fn capture_rendered(
    renderer: &dyn Renderer,
    store: &ArtifactStore,
    config: &HarvestConfig,
    id: &Identifier,
) -> FetchOutcome {
    let path = store.path_for(id, ArtifactKind::RenderedCapture);
    if store.contains(id, ArtifactKind::RenderedCapture) {
        return FetchOutcome::AlreadyPresent { path };
    }

    let url = match config.html_url(id) {
        Ok(u) => u,
        Err(e) => {
            return FetchOutcome::Failed(FetchError::NavigationFailed {
                detail: e.to_string(),
            })
        }
    };

    let mut session = match renderer.start().await {
        Ok(s) => s,
        Err(e) => return FetchOutcome::Failed(e.into()),
    };
    let captured = capture_with(
        &mut session,
        url.as_str(),
        Duration::from_secs(config.page_load_timeout_secs),
        &config.rate_limit_marker,
    )
    .await;
    session.close().await;

    let pdf = match captured {
        Ok(pdf) => pdf,
        Err(e) => return FetchOutcome::Failed(e),
    };
    match store.write_atomic(&path, pdf).await {
        Ok(bytes) => FetchOutcome::Saved { path, bytes },
        Err(e) => FetchOutcome::Failed(e),
    }
}

/// Navigate, gate and print within an already started session.
async fn capture_with(
    session: &mut Box<dyn RenderSession>,
    url: &str,
    timeout: Duration,
    marker: &str,
) -> Result<Vec<u8>, FetchError> {
    let page = session.load(url, timeout).await?;
    check_gates(&page, marker)?;

    let pdf = session.print_pdf().await?;
    if pdf.is_empty() {
        return Err(FetchError::EmptyBody);
    }
    debug!("Printed {} bytes", pdf.len());
    Ok(pdf)
}

/// Decide whether a loaded page may be captured.
///
/// Status is checked first, so a 429 is reported as rate limiting even when
/// the body also matches.
pub fn check_gates(page: &LoadedPage, marker: &str) -> Result<(), FetchError> {
    match page.status {
        Some(200) => {}
        Some(status) if signals::is_rate_limited_status(status) => {
            return Err(FetchError::RateLimited {
                detail: format!("HTTP {status}"),
            })
        }
        Some(status) => return Err(FetchError::BadStatus { status }),
        None => {
            return Err(FetchError::RenderGateFailed {
                reason: "no response status observed for the navigation".into(),
            })
        }
    }
    if signals::is_rate_limited_body(&page.html, marker) {
        return Err(FetchError::RateLimited {
            detail: format!("page body contains '{marker}'"),
        });
    }
    Ok(())
}
