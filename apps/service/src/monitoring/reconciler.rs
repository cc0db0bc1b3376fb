use std::sync::Arc;

use super::types::{Outcome, StatusValue, Target};
use crate::database::Registry;
use crate::error::MonitorError;

/// Map a probe outcome to the status that gets persisted
pub fn status_for(outcome: &Outcome) -> StatusValue {
    match outcome {
        Outcome::NoUrl => StatusValue::NoLiveUrl,
        Outcome::InvalidUrl => StatusValue::InvalidUrl,
        Outcome::Unreachable(_) => StatusValue::Down,
        Outcome::Reachable(200) => StatusValue::Up,
        Outcome::Reachable(_) => StatusValue::Down,
    }
}

/// Status reconciler - writes a probe outcome back to the registry
pub struct StatusReconciler {
    registry: Arc<dyn Registry>,
}

impl StatusReconciler {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self { registry }
    }

    /// Persist the status for one target
    ///
    /// Issues exactly one keyed update. A failed write is returned to the
    /// caller and never retried here.
    pub async fn reconcile(&self, target: &Target, outcome: &Outcome) -> Result<StatusValue, MonitorError> {
        let status = status_for(outcome);

        self.registry
            .update_status(target.id, &status)
            .await
            .map_err(|e| MonitorError::write_failed(target.id, &e))?;

        Ok(status)
    }
}
