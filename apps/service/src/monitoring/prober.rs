use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use super::checker::Checker;
use super::types::{Outcome, ProbeFailure, Target};
use super::validation::parse_checkable_url;

/// Health prober - runs one liveness check against one target
pub struct HealthProber {
    checker: Arc<dyn Checker>,
    timeout: Duration,
}

impl HealthProber {
    /// Create a new prober
    ///
    /// `timeout` bounds every check regardless of what the checker itself
    /// enforces, so a hung target always resolves to `Unreachable`.
    pub fn new(checker: Arc<dyn Checker>, timeout: Duration) -> Self {
        Self { checker, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe a target and classify the result
    ///
    /// No request is made for targets without a URL or with an invalid one.
    /// There are no retries; the next cycle is the retry.
    pub async fn probe(&self, target: &Target) -> Outcome {
        let raw = match target.live_url.as_deref().map(str::trim) {
            None | Some("") => return Outcome::NoUrl,
            Some(raw) => raw,
        };

        let Some(url) = parse_checkable_url(raw) else {
            return Outcome::InvalidUrl;
        };

        match timeout(self.timeout, self.checker.check(&url)).await {
            Ok(Ok(status_code)) => Outcome::Reachable(status_code),
            Ok(Err(failure)) => Outcome::Unreachable(failure),
            Err(_) => Outcome::Unreachable(ProbeFailure::timed_out(self.timeout)),
        }
    }
}
