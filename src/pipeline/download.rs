//! Direct fetcher: GET the PDF endpoint and persist a validated body.
//!
//! Checks run in order and the first failure wins:
//!
//! 1. artifact already on disk → [`FetchOutcome::AlreadyPresent`], no request
//! 2. status must be exactly 200 (429 is classified as rate limiting)
//! 3. `Content-Type` must contain `application/pdf`
//! 4. the fully buffered body must be non-empty
//! 5. atomic write via [`ArtifactStore::write_atomic`]
//!
//! The request URL embeds the access token, so it never appears in logs or
//! error text; the identifier does.

use crate::config::HarvestConfig;
use crate::error::{error_chain, FetchError};
use crate::output::{ArtifactKind, FetchOutcome};
use crate::pipeline::normalize::Identifier;
use crate::pipeline::store::ArtifactStore;
use crate::signals;
use futures::StreamExt;
use std::time::Duration;
use tracing::debug;

const EXPECTED_CONTENT_TYPE: &str = "application/pdf";

/// Upper bound on the buffer reserved from a declared `Content-Length`.
const MAX_PREALLOC: usize = 8 << 20;

/// Acquire the direct PDF for `id`.
pub async fn fetch_binary(
    client: &reqwest::Client,
    store: &ArtifactStore,
    config: &HarvestConfig,
    id: &Identifier,
) -> FetchOutcome {
    let path = store.path_for(id, ArtifactKind::DirectBinary);
    if store.contains(id, ArtifactKind::DirectBinary) {
        return FetchOutcome::AlreadyPresent { path };
    }

    let bytes = match download(client, config, id).await {
        Ok(b) => b,
        Err(e) => return FetchOutcome::Failed(e),
    };

    match store.write_atomic(&path, bytes).await {
        Ok(bytes) => FetchOutcome::Saved { path, bytes },
        Err(e) => FetchOutcome::Failed(e),
    }
}

/// Request, validate and buffer the body. Nothing touches the disk here.
async fn download(
    client: &reqwest::Client,
    config: &HarvestConfig,
    id: &Identifier,
) -> Result<Vec<u8>, FetchError> {
    let url = config.pdf_url(id).map_err(|e| FetchError::Transport {
        detail: e.to_string(),
    })?;
    let timeout_secs = config.download_timeout_secs;

    debug!("GET pdf for {}", id);
    let response = client
        .get(url)
        .timeout(Duration::from_secs(timeout_secs))
        .send()
        .await
        .map_err(|e| transport_error(e, timeout_secs))?;

    let status = response.status().as_u16();
    if signals::is_rate_limited_status(status) {
        return Err(FetchError::RateLimited {
            detail: format!("HTTP {status}"),
        });
    }
    if status != 200 {
        return Err(FetchError::BadStatus { status });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !content_type.contains(EXPECTED_CONTENT_TYPE) {
        return Err(FetchError::BadContentType { content_type });
    }

    // Content-Length is only a hint; a bogus value must not size the buffer.
    let hint = response
        .content_length()
        .map_or(0, |n| usize::try_from(n).map_or(MAX_PREALLOC, |n| n.min(MAX_PREALLOC)));
    let mut body = Vec::with_capacity(hint);
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| transport_error(e, timeout_secs))?;
        body.extend_from_slice(&chunk);
    }

    if body.is_empty() {
        return Err(FetchError::EmptyBody);
    }
    debug!("Buffered {} bytes for {}", body.len(), id);
    Ok(body)
}

fn transport_error(e: reqwest::Error, timeout_secs: u64) -> FetchError {
    // Strip the URL so the token never leaks into reports.
    let e = e.without_url();
    let detail = if e.is_timeout() {
        format!("timed out after {timeout_secs}s")
    } else {
        error_chain(&e)
    };
    FetchError::Transport { detail }
}
