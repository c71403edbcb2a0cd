//! Upstream signal detection: rate-limit bodies and dropped connections.
//!
//! The upstream service does not offer a contract for either signal. A
//! throttled HTML view can come back as HTTP 200 wrapping a JSON error
//! payload, and a dropped socket only shows up as error text from the
//! browser or the HTTP stack. Both checks are therefore plain text matches,
//! and both are brittle: the upstream wording can change at any time.
//!
//! Every such match lives here so it can be hardened or replaced without
//! touching the fetch paths. Callers pass the marker text in from
//! [`crate::config::HarvestConfig::rate_limit_marker`]; the constant below
//! is only the default.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default literal the upstream embeds in a throttled response body.
///
/// The quotes are part of the marker: the throttled page is a JSON error
/// payload, and the bare phrase turns up in ordinary patent text.
pub const DEFAULT_RATE_LIMIT_MARKER: &str = r#""Too Many Requests""#;

/// Error text produced when the peer tears the connection down mid-exchange.
///
/// Covers the Windows wording ("forcibly closed by the remote host"), the
/// POSIX `ECONNRESET` wording, Chromium's `net::ERR_CONNECTION_*` codes and
/// hyper's "connection closed before message completed".
static CONNECTION_CLOSED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)forcibly closed|connection reset|ERR_CONNECTION_(RESET|CLOSED|ABORTED)|connection closed before",
    )
    .expect("static regex")
});

/// Whether rendered page content carries the upstream rate-limit message.
///
/// Exact, case-sensitive substring match. An empty marker never matches.
pub fn is_rate_limited_body(content: &str, marker: &str) -> bool {
    !marker.is_empty() && content.contains(marker)
}

/// Whether an HTTP status means rate limiting.
pub fn is_rate_limited_status(status: u16) -> bool {
    status == 429
}

/// Whether error text describes a forcibly-closed connection.
pub fn is_connection_closed(error_text: &str) -> bool {
    CONNECTION_CLOSED.is_match(error_text)
}
