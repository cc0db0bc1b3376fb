//! Validation of stored live URLs and probe settings.
//!
//! Everything here is pure: no network access, and a malformed value is a
//! normal `false`/`Err` result rather than a panic.

use anyhow::{Result, anyhow};
use std::time::Duration;
use url::Url;

/// Parse a stored live URL into something the prober can request
///
/// Returns `None` for empty input and for anything that is not an absolute
/// URL with both a scheme and a host.
pub fn parse_checkable_url(candidate: &str) -> Option<Url> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }

    let url = Url::parse(candidate).ok()?;

    // `mailto:`, `data:` and friends parse fine but have nothing to connect to
    match url.host_str() {
        Some(host) if !host.is_empty() => Some(url),
        _ => None,
    }
}

/// Whether a stored live URL is well-formed and checkable
pub fn is_valid_url(candidate: Option<&str>) -> bool {
    candidate.and_then(parse_checkable_url).is_some()
}

/// Validate a probe timeout is reasonable
pub fn validate_timeout(timeout: Duration) -> Result<()> {
    const MIN_TIMEOUT: Duration = Duration::from_secs(1);
    const MAX_TIMEOUT: Duration = Duration::from_secs(300); // 5 minutes

    if timeout < MIN_TIMEOUT {
        return Err(anyhow!(
            "Timeout too short: {}ms (minimum: {}ms)",
            timeout.as_millis(),
            MIN_TIMEOUT.as_millis()
        ));
    }

    if timeout > MAX_TIMEOUT {
        return Err(anyhow!(
            "Timeout too long: {} seconds (maximum: {})",
            timeout.as_secs(),
            MAX_TIMEOUT.as_secs()
        ));
    }

    Ok(())
}
