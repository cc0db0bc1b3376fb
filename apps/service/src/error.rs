use thiserror::Error;

use crate::monitoring::types::TargetId;

/// Failures the monitoring core distinguishes
///
/// Probe results (no URL, invalid URL, unreachable) are not errors; they are
/// classified outcomes and live in [`crate::monitoring::types::Outcome`].
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The target snapshot could not be read; aborts the current cycle only
    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// A status write failed; aborts only that target's unit
    #[error("Status update for target {id} failed: {reason}")]
    RegistryWriteFailed { id: TargetId, reason: String },

    #[error("Invalid schedule `{expression}`: {reason}")]
    Schedule { expression: String, reason: String },

    #[error("Unknown timezone `{0}`")]
    Timezone(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl MonitorError {
    pub fn registry_unavailable(error: &anyhow::Error) -> Self {
        MonitorError::RegistryUnavailable(format!("{error:#}"))
    }

    pub fn write_failed(id: TargetId, error: &anyhow::Error) -> Self {
        MonitorError::RegistryWriteFailed { id, reason: format!("{error:#}") }
    }
}
