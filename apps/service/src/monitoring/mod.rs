/// Liveness monitoring - periodically checks every project's live URL
///
/// This module is responsible for:
/// - Validating stored live URLs
/// - Listing targets from the registry once per cycle
/// - Probing each target in its own task, with a timeout
/// - Reconciling each outcome into the persisted status
/// - Scheduling cycles on a fixed cadence
pub mod checker;
pub mod cycle;
pub mod lister;
pub mod prober;
pub mod reconciler;
pub mod report;
pub mod scheduler;
pub mod types;
pub mod validation;

pub use checker::{Checker, HttpChecker};
pub use cycle::{CycleRunner, DispatchedCycle};
pub use prober::HealthProber;
pub use reconciler::{StatusReconciler, status_for};
pub use report::{CycleReport, MonitorState, StatusSnapshot};
pub use scheduler::{MonitoringScheduler, Schedule, ScheduleTicker, SchedulerHandle, Ticker};
pub use types::{Outcome, StatusValue, Target, TargetId};
pub use validation::is_valid_url;
