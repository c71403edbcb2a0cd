//! Identifier source: one search request per run.
//!
//! Only `docs[].patentNumber` is read from the response. Every other field is
//! requested to keep the payload identical to what the upstream web client
//! sends, not because the pipeline uses it.

use crate::config::HarvestConfig;
use crate::error::SearchError;
use crate::pipeline::normalize::Identifier;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Databases searched. Duplicates across them are removed by the normalizer.
const DATABASES: [&str; 3] = ["USPAT", "US-PGPUB", "USOCR"];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    #[serde(rename = "patentNumber")]
    patent_number: Option<String>,
}

/// The JSON body for a newest-first search returning `batch_size` records.
pub fn search_payload(batch_size: usize) -> serde_json::Value {
    json!({
        "cursorMarker": "*",
        "databaseFilters": DATABASES
            .iter()
            .map(|db| json!({ "databaseName": db }))
            .collect::<Vec<_>>(),
        "fields": [
            "documentId",
            "patentNumber",
            "title",
            "datePublished",
            "inventors",
            "pageCount",
            "type"
        ],
        "op": "AND",
        "pageSize": batch_size,
        "q": "a",
        "searchType": 0,
        "sort": "date_publ desc"
    })
}

/// Query the search endpoint and return the reported identifiers in order.
///
/// Duplicates are kept; see [`crate::pipeline::normalize::dedupe`].
pub async fn fetch_identifiers(
    client: &reqwest::Client,
    config: &HarvestConfig,
) -> Result<Vec<Identifier>, SearchError> {
    let url = config.search_url.as_str();
    info!("Searching {} for {} identifiers", url, config.batch_size);

    let mut request = client
        .post(url)
        .timeout(Duration::from_secs(config.search_timeout_secs))
        .json(&search_payload(config.batch_size));
    if let Some(token) = &config.access_token {
        request = request.header("x-access-token", token);
    }

    let response = request.send().await.map_err(|e| SearchError::Transport {
        url: url.to_string(),
        reason: if e.is_timeout() {
            format!("timed out after {}s", config.search_timeout_secs)
        } else {
            e.to_string()
        },
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(SearchError::BadStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.bytes().await.map_err(|e| SearchError::Transport {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    debug!("Search response: {} bytes", body.len());

    let ids = parse_identifiers(&body)?;
    info!("Search reported {} identifiers", ids.len());
    Ok(ids)
}

/// Extract `docs[].patentNumber` from a search response body.
///
/// Records without a usable identifier are logged and skipped.
pub fn parse_identifiers(body: &[u8]) -> Result<Vec<Identifier>, SearchError> {
    let response: SearchResponse =
        serde_json::from_slice(body).map_err(|e| SearchError::Parse(e.to_string()))?;

    let mut ids = Vec::with_capacity(response.docs.len());
    for (i, doc) in response.docs.into_iter().enumerate() {
        match doc.patent_number.as_deref().and_then(Identifier::new) {
            Some(id) => ids.push(id),
            None => warn!(
                "Skipping search record {}: unusable identifier {:?}",
                i, doc.patent_number
            ),
        }
    }
    Ok(ids)
}
