use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::checker::Checker;
use super::lister::{DEFAULT_LIST_TIMEOUT, TargetLister};
use super::prober::HealthProber;
use super::reconciler::StatusReconciler;
use super::report::{CycleReport, UnitReport};
use super::types::{Target, TargetId};
use crate::database::Registry;
use crate::error::MonitorError;

/// Runs monitoring cycles: list, then one independent task per target
pub struct CycleRunner {
    lister: TargetLister,
    prober: Arc<HealthProber>,
    reconciler: Arc<StatusReconciler>,
    sequence: AtomicU64,
}

impl CycleRunner {
    pub fn new(registry: Arc<dyn Registry>, checker: Arc<dyn Checker>, probe_timeout: Duration) -> Self {
        Self {
            lister: TargetLister::new(registry.clone(), DEFAULT_LIST_TIMEOUT),
            prober: Arc::new(HealthProber::new(checker, probe_timeout)),
            reconciler: Arc::new(StatusReconciler::new(registry)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Bound on the registry snapshot taken at the start of each cycle
    pub fn list_timeout(mut self, timeout: Duration) -> Self {
        self.lister = self.lister.with_timeout(timeout);
        self
    }

    /// Take a snapshot and spawn a unit for every target
    ///
    /// Returns as soon as every unit is spawned. The units keep running even
    /// if the returned [`DispatchedCycle`] is dropped.
    pub async fn dispatch(&self) -> Result<DispatchedCycle, MonitorError> {
        let cycle = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let started_at = Utc::now();

        let targets = self.lister.list_targets().await?;
        info!(cycle, targets = targets.len(), "Dispatching monitoring cycle");

        let units = targets
            .into_iter()
            .map(|target| {
                let id = target.id;
                let handle = tokio::spawn(run_unit(self.prober.clone(), self.reconciler.clone(), target));
                (id, handle)
            })
            .collect();

        Ok(DispatchedCycle { cycle, started_at, units })
    }
}

/// Probe then reconcile one target. Nothing in here can fail another unit.
async fn run_unit(prober: Arc<HealthProber>, reconciler: Arc<StatusReconciler>, target: Target) -> UnitReport {
    let outcome = prober.probe(&target).await;
    debug!(
        target_id = target.id,
        name = %target.name,
        url = target.live_url.as_deref().unwrap_or(""),
        previous = %target.status,
        %outcome,
        "Probed target"
    );

    let persisted = match reconciler.reconcile(&target, &outcome).await {
        Ok(status) => Some(status),
        Err(e) => {
            warn!(target_id = target.id, name = %target.name, error = %e, "Status update failed");
            None
        }
    };

    UnitReport { target_id: target.id, outcome, persisted }
}

/// A cycle whose units are in flight
pub struct DispatchedCycle {
    cycle: u64,
    started_at: DateTime<Utc>,
    units: Vec<(TargetId, JoinHandle<UnitReport>)>,
}

impl DispatchedCycle {
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Wait for every unit and summarize
    ///
    /// Used for reporting only. Units complete in whatever order their
    /// probes do; a panicked unit is counted and logged.
    pub async fn collect(self) -> CycleReport {
        let mut report = CycleReport::new(self.cycle, self.started_at, self.units.len());

        let mut pending: FuturesUnordered<_> = self
            .units
            .into_iter()
            .map(|(id, handle)| async move { (id, handle.await) })
            .collect();

        while let Some((id, joined)) = pending.next().await {
            match joined {
                Ok(unit) => report.record(&unit),
                Err(e) => {
                    warn!(cycle = self.cycle, target_id = id, error = %e, "Monitoring unit panicked");
                    report.record_panic();
                }
            }
        }

        report.finish();
        report
    }
}
