use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::types::{Outcome, StatusValue, TargetId};

/// What happened to one target in one cycle
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub target_id: TargetId,
    pub outcome: Outcome,
    /// Status that was written, `None` if the write failed
    pub persisted: Option<StatusValue>,
}

/// Summary of one cycle, built once all of its units have finished
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub targets: usize,
    pub up: usize,
    pub down: usize,
    pub invalid_url: usize,
    pub no_live_url: usize,
    pub write_failures: usize,
    pub panicked: usize,
}

impl CycleReport {
    pub fn new(cycle: u64, started_at: DateTime<Utc>, targets: usize) -> Self {
        Self { cycle, started_at, targets, ..Default::default() }
    }

    pub fn record(&mut self, unit: &UnitReport) {
        match &unit.persisted {
            Some(StatusValue::Up) => self.up += 1,
            Some(StatusValue::Down) => self.down += 1,
            Some(StatusValue::InvalidUrl) => self.invalid_url += 1,
            Some(StatusValue::NoLiveUrl) => self.no_live_url += 1,
            Some(StatusValue::Other(_)) => {}
            None => self.write_failures += 1,
        }
    }

    pub fn record_panic(&mut self) {
        self.panicked += 1;
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

/// Point-in-time view of the monitor, served on `/v1/status`
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub schedule: String,
    pub timezone: String,
    pub next_tick: Option<DateTime<Utc>>,
    pub cycles_dispatched: u64,
    pub cycles_aborted: u64,
    pub last_abort: Option<String>,
    pub last_report: Option<CycleReport>,
}

/// Shared reporting state
///
/// Only the scheduler and the cycle collectors write here; units never read
/// it, so it plays no part in control flow.
#[derive(Debug, Clone, Default)]
pub struct MonitorState {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl MonitorState {
    pub fn new(schedule: impl Into<String>, timezone: impl Into<String>) -> Self {
        let snapshot = StatusSnapshot {
            schedule: schedule.into(),
            timezone: timezone.into(),
            ..Default::default()
        };
        Self { inner: Arc::new(RwLock::new(snapshot)) }
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().await.clone()
    }

    pub async fn set_next_tick(&self, next_tick: Option<DateTime<Utc>>) {
        self.inner.write().await.next_tick = next_tick;
    }

    pub async fn record_dispatch(&self) {
        self.inner.write().await.cycles_dispatched += 1;
    }

    pub async fn record_abort(&self, reason: String) {
        let mut inner = self.inner.write().await;
        inner.cycles_aborted += 1;
        inner.last_abort = Some(reason);
    }

    /// Keep the report of the most recent cycle
    ///
    /// Cycles may overlap and finish out of order; an older cycle finishing
    /// late does not replace a newer report.
    pub async fn record_report(&self, report: CycleReport) {
        let mut inner = self.inner.write().await;
        let newer = inner.last_report.as_ref().is_none_or(|last| report.cycle >= last.cycle);
        if newer {
            inner.last_report = Some(report);
        }
    }
}
