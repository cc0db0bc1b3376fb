use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::types::Target;
use crate::database::Registry;
use crate::error::MonitorError;

/// Upper bound on a single registry snapshot
pub const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(30);

/// Target lister - takes the per-cycle snapshot of monitored projects
pub struct TargetLister {
    registry: Arc<dyn Registry>,
    timeout: Duration,
}

impl TargetLister {
    pub fn new(registry: Arc<dyn Registry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Read the current set of targets with a single registry query
    ///
    /// A read that outlives the timeout counts as the registry being
    /// unavailable.
    pub async fn list_targets(&self) -> Result<Vec<Target>, MonitorError> {
        let targets = match tokio::time::timeout(self.timeout, self.registry.list_targets()).await {
            Ok(listed) => listed.map_err(|e| MonitorError::registry_unavailable(&e))?,
            Err(_) => {
                return Err(MonitorError::RegistryUnavailable(format!(
                    "listing timed out after {}ms",
                    self.timeout.as_millis()
                )));
            }
        };

        debug!(count = targets.len(), "Listed monitoring targets");
        Ok(targets)
    }
}
