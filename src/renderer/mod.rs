//! Headless browser abstraction for the rendered capture path.
//!
//! [`Renderer`] starts one isolated browser per capture and [`RenderSession`]
//! drives it through a single navigation. Production code uses
//! [`chromium::ChromiumRenderer`]; tests substitute a scripted fake.

pub mod chromium;

use crate::error::BrowserError;
use async_trait::async_trait;
use std::time::Duration;

pub use chromium::ChromiumRenderer;

/// What a navigation produced, before any capture decision is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPage {
    /// Status of the network response whose URL matched the navigation
    /// target. `None` if no such response was observed.
    pub status: Option<u16>,
    /// Rendered HTML once `body` was present.
    pub html: String,
}

/// A browser engine that can start isolated sessions.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Start a fresh browser for one capture.
    async fn start(&self) -> Result<Box<dyn RenderSession>, BrowserError>;
}

/// One browser session, used for a single navigation and then closed.
#[async_trait]
pub trait RenderSession: Send {
    /// Navigate to `url` and wait for the document body.
    ///
    /// The response-status listener must be attached before navigation
    /// starts, or the document response can be missed.
    async fn load(&mut self, url: &str, timeout: Duration) -> Result<LoadedPage, BrowserError>;

    /// Print the loaded page to PDF without background graphics.
    async fn print_pdf(&mut self) -> Result<Vec<u8>, BrowserError>;

    /// Tear the session down. Never fails; teardown errors are logged.
    async fn close(self: Box<Self>);
}

/// Whether a network response URL is the navigation target itself rather
/// than a sub-resource.
///
/// Compared exactly, with a fallback to parsed-URL equality so that
/// normalisation by the browser (e.g. a trailing `/` on a bare host) still
/// matches.
pub fn is_navigation_response(event_url: &str, target: &str) -> bool {
    if event_url == target {
        return true;
    }
    match (reqwest::Url::parse(event_url), reqwest::Url::parse(target)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
