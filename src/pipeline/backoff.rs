//! Fixed-delay cooldown after upstream pushback.
//!
//! Stateless: each outcome is judged alone and nothing is counted across
//! attempts. The failed attempt is never retried in the same run; the pause
//! only protects the next one.

use crate::output::{ArtifactKind, FetchOutcome};
use std::time::Duration;
use tracing::warn;

/// What the orchestrator should do after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
    Proceed,
    CoolDown(Duration),
}

/// Decide whether `outcome` calls for a pause.
///
/// Rate limiting cools down on either path. A forcibly closed connection
/// only does on the rendered path, where it is how the upstream drops a
/// throttled browser.
pub fn decide(kind: ArtifactKind, outcome: &FetchOutcome, cooldown: Duration) -> BackoffDecision {
    let Some(err) = outcome.error() else {
        return BackoffDecision::Proceed;
    };
    let pushback = err.is_rate_limited()
        || (kind == ArtifactKind::RenderedCapture && err.is_connection_closed());
    if pushback {
        BackoffDecision::CoolDown(cooldown)
    } else {
        BackoffDecision::Proceed
    }
}

/// Block the pipeline for `duration`.
pub async fn cool_down(duration: Duration) {
    warn!("Upstream pushback, pausing for {:?}", duration);
    tokio::time::sleep(duration).await;
}
