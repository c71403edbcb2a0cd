//! Configuration types for a harvest run.
//!
//! All run behaviour is controlled through [`HarvestConfig`], built via its
//! [`HarvestConfigBuilder`]. Endpoints and the access credential are plain
//! fields here and get passed into the identifier source, the direct fetcher
//! and the rendered capture engine. Nothing is a process-wide constant.

use crate::error::HarvestError;
use crate::pipeline::normalize::Identifier;
use crate::progress::ProgressCallback;
use crate::signals::DEFAULT_RATE_LIMIT_MARKER;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default search endpoint.
pub const DEFAULT_SEARCH_URL: &str = "https://ppubs.uspto.gov/api/searches/generic";
/// Default binary download endpoint; the identifier is appended as a path segment.
pub const DEFAULT_PDF_URL_BASE: &str = "https://ppubs.uspto.gov/api/pdf/downloadPdf";
/// Default HTML view endpoint; the identifier is appended as a path segment.
pub const DEFAULT_HTML_URL_BASE: &str = "https://ppubs.uspto.gov/api/patents/html";

/// Configuration for a harvest run.
///
/// Built via [`HarvestConfig::builder()`] or using [`HarvestConfig::default()`].
///
/// # Example
/// ```rust
/// use uspto_harvest::HarvestConfig;
/// use std::time::Duration;
///
/// let config = HarvestConfig::builder()
///     .output_dir("PDFs")
///     .batch_size(50)
///     .cooldown(Duration::from_secs(60))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct HarvestConfig {
    /// Directory artifacts are written to. Default: `PDFs`.
    ///
    /// The presence of `{output_dir}/{identifier}{suffix}` is the only
    /// completion record; re-running against the same directory skips
    /// everything already there.
    pub output_dir: PathBuf,

    /// Access credential sent as `x-access-token` on the search request and
    /// as the `requestToken` query parameter on both artifact URLs.
    pub access_token: Option<String>,

    /// Search endpoint queried once per run.
    pub search_url: String,

    /// Base URL of the direct PDF download endpoint.
    pub pdf_url_base: String,

    /// Base URL of the HTML view endpoint.
    pub html_url_base: String,

    /// `source` query parameter for the HTML view. Default: `US-PGPUB`.
    pub html_source: String,

    /// Number of records requested from the search. Default: 100.
    pub batch_size: usize,

    /// Timeout for the search request in seconds. Default: 60.
    pub search_timeout_secs: u64,

    /// Timeout for one direct PDF download in seconds. Default: 180.
    ///
    /// Bounds a stalled transfer; there is no other cancellation.
    pub download_timeout_secs: u64,

    /// Timeout for one browser navigation in seconds. Default: 180.
    pub page_load_timeout_secs: u64,

    /// Pause applied after a rate-limit or dropped-connection signal. Default: 60 s.
    pub cooldown: Duration,

    /// Literal text the upstream puts in a throttled HTML response.
    ///
    /// See [`crate::signals::is_rate_limited_body`].
    pub rate_limit_marker: String,

    /// Browser executable. If None, [`chromium_auto::ensure_chromium`] searches.
    pub chrome_executable: Option<PathBuf>,

    /// Optional per-attempt progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("PDFs"),
            access_token: None,
            search_url: DEFAULT_SEARCH_URL.to_string(),
            pdf_url_base: DEFAULT_PDF_URL_BASE.to_string(),
            html_url_base: DEFAULT_HTML_URL_BASE.to_string(),
            html_source: "US-PGPUB".to_string(),
            batch_size: 100,
            search_timeout_secs: 60,
            download_timeout_secs: 180,
            page_load_timeout_secs: 180,
            cooldown: Duration::from_secs(60),
            rate_limit_marker: DEFAULT_RATE_LIMIT_MARKER.to_string(),
            chrome_executable: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for HarvestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestConfig")
            .field("output_dir", &self.output_dir)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("search_url", &self.search_url)
            .field("pdf_url_base", &self.pdf_url_base)
            .field("html_url_base", &self.html_url_base)
            .field("html_source", &self.html_source)
            .field("batch_size", &self.batch_size)
            .field("search_timeout_secs", &self.search_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("page_load_timeout_secs", &self.page_load_timeout_secs)
            .field("cooldown", &self.cooldown)
            .field("rate_limit_marker", &self.rate_limit_marker)
            .field("chrome_executable", &self.chrome_executable)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn HarvestProgressCallback>"),
            )
            .finish()
    }
}

impl HarvestConfig {
    /// Create a new builder for `HarvestConfig`.
    pub fn builder() -> HarvestConfigBuilder {
        HarvestConfigBuilder {
            config: Self::default(),
        }
    }

    /// Direct download URL: `{pdf_url_base}/{id}?requestToken={token}`.
    ///
    /// The result carries the credential; log the identifier, not the URL.
    pub fn pdf_url(&self, id: &Identifier) -> Result<reqwest::Url, HarvestError> {
        let mut url = artifact_url(&self.pdf_url_base, id)?;
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair("requestToken", token);
        }
        Ok(url)
    }

    /// HTML view URL: `{html_url_base}/{id}?source={html_source}&requestToken={token}`.
    pub fn html_url(&self, id: &Identifier) -> Result<reqwest::Url, HarvestError> {
        let mut url = artifact_url(&self.html_url_base, id)?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("source", &self.html_source);
            if let Some(token) = &self.access_token {
                q.append_pair("requestToken", token);
            }
        }
        Ok(url)
    }
}

fn artifact_url(base: &str, id: &Identifier) -> Result<reqwest::Url, HarvestError> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| HarvestError::InvalidConfig(format!("Invalid base URL '{base}': {e}")))?;
    url.path_segments_mut()
        .map_err(|_| HarvestError::InvalidConfig(format!("Base URL '{base}' cannot have a path")))?
        .pop_if_empty()
        .push(id.as_str());
    Ok(url)
}

/// Builder for [`HarvestConfig`].
pub struct HarvestConfigBuilder {
    config: HarvestConfig,
}

impl fmt::Debug for HarvestConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl HarvestConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.access_token = Some(token.into());
        self
    }

    pub fn search_url(mut self, url: impl Into<String>) -> Self {
        self.config.search_url = url.into();
        self
    }

    pub fn pdf_url_base(mut self, url: impl Into<String>) -> Self {
        self.config.pdf_url_base = url.into();
        self
    }

    pub fn html_url_base(mut self, url: impl Into<String>) -> Self {
        self.config.html_url_base = url.into();
        self
    }

    pub fn html_source(mut self, source: impl Into<String>) -> Self {
        self.config.html_source = source.into();
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n;
        self
    }

    pub fn search_timeout_secs(mut self, secs: u64) -> Self {
        self.config.search_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn page_load_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_load_timeout_secs = secs.max(1);
        self
    }

    pub fn cooldown(mut self, d: Duration) -> Self {
        self.config.cooldown = d;
        self
    }

    pub fn rate_limit_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.rate_limit_marker = marker.into();
        self
    }

    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_executable = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<HarvestConfig, HarvestError> {
        let c = &self.config;
        if c.batch_size == 0 {
            return Err(HarvestError::InvalidConfig(
                "Batch size must be ≥ 1".into(),
            ));
        }
        if matches!(c.access_token.as_deref(), Some(t) if t.trim().is_empty()) {
            return Err(HarvestError::InvalidConfig(
                "Access token must not be empty".into(),
            ));
        }
        if c.rate_limit_marker.is_empty() {
            return Err(HarvestError::InvalidConfig(
                "Rate-limit marker must not be empty".into(),
            ));
        }
        for (name, url) in [
            ("search URL", &c.search_url),
            ("PDF base URL", &c.pdf_url_base),
            ("HTML base URL", &c.html_url_base),
        ] {
            reqwest::Url::parse(url).map_err(|e| {
                HarvestError::InvalidConfig(format!("Invalid {name} '{url}': {e}"))
            })?;
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_upstream_pacing() {
        let c = HarvestConfig::default();
        assert_eq!(c.download_timeout_secs, 180);
        assert_eq!(c.cooldown, Duration::from_secs(60));
        assert_eq!(c.batch_size, 100);
        assert_eq!(c.output_dir, PathBuf::from("PDFs"));
    }

    #[test]
    fn zero_batch_size_rejected() {
        let err = HarvestConfig::builder().batch_size(0).build().unwrap_err();
        assert!(err.to_string().contains("Batch size"), "got: {err}");
    }

    #[test]
    fn blank_token_rejected() {
        assert!(HarvestConfig::builder().access_token("  ").build().is_err());
    }

    #[test]
    fn bad_url_rejected() {
        let err = HarvestConfig::builder()
            .pdf_url_base("not a url")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("PDF base URL"), "got: {err}");
    }

    #[test]
    fn debug_redacts_token() {
        let c = HarvestConfig::builder()
            .access_token("secret-token-value")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-token-value"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn debug_lists_every_timeout() {
        let c = HarvestConfig::builder()
            .search_timeout_secs(42)
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("search_timeout_secs: 42"), "got: {dbg}");
        assert!(dbg.contains("download_timeout_secs"));
        assert!(dbg.contains("page_load_timeout_secs"));
    }

    #[test]
    fn artifact_urls_carry_identifier_and_token() {
        let c = HarvestConfig::builder()
            .access_token("tok")
            .pdf_url_base("http://127.0.0.1:9/api/pdf/downloadPdf")
            .html_url_base("http://127.0.0.1:9/api/patents/html/")
            .build()
            .unwrap();
        let id = Identifier::new("US-20240001-A1").unwrap();
        assert_eq!(
            c.pdf_url(&id).unwrap().as_str(),
            "http://127.0.0.1:9/api/pdf/downloadPdf/US-20240001-A1?requestToken=tok"
        );
        assert_eq!(
            c.html_url(&id).unwrap().as_str(),
            "http://127.0.0.1:9/api/patents/html/US-20240001-A1?source=US-PGPUB&requestToken=tok"
        );
    }

    #[test]
    fn artifact_url_without_token_has_no_token_param() {
        let c = HarvestConfig::default();
        let id = Identifier::new("US-1").unwrap();
        assert!(!c.pdf_url(&id).unwrap().as_str().contains("requestToken"));
    }

    #[test]
    fn timeouts_are_at_least_one_second() {
        let c = HarvestConfig::builder()
            .download_timeout_secs(0)
            .page_load_timeout_secs(0)
            .build()
            .unwrap();
        assert_eq!(c.download_timeout_secs, 1);
        assert_eq!(c.page_load_timeout_secs, 1);
    }
}
