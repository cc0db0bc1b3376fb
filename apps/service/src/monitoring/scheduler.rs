use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::cycle::CycleRunner;
use super::report::MonitorState;
use crate::error::MonitorError;

/// How often cycles fire
#[derive(Debug, Clone)]
pub enum Cadence {
    /// Fixed period, e.g. `every 5m`
    Interval(Duration),
    /// Cron expression evaluated in the schedule's timezone
    Cron(Box<cron::Schedule>),
}

/// Cadence plus the timezone it is evaluated in
#[derive(Debug, Clone)]
pub struct Schedule {
    expression: String,
    cadence: Cadence,
    timezone: Tz,
}

impl Schedule {
    /// Parse a cadence expression
    ///
    /// Accepts `every <n><s|m|h>` intervals and cron expressions. Five-field
    /// cron (`*/5 * * * *`) follows crontab: it gets a leading seconds field
    /// of `0` and its weekdays are numbered 0-7 with Sunday as 0 or 7.
    pub fn parse(expression: &str, timezone: &str) -> Result<Self, MonitorError> {
        let timezone = Tz::from_str(timezone.trim()).map_err(|_| MonitorError::Timezone(timezone.to_string()))?;
        let trimmed = expression.trim();

        let cadence = match trimmed.strip_prefix("every ") {
            Some(interval) => Cadence::Interval(parse_interval(interval.trim()).ok_or_else(|| {
                MonitorError::Schedule {
                    expression: expression.to_string(),
                    reason: "expected an interval such as `every 30s`, `every 5m` or `every 1h`".to_string(),
                }
            })?),
            None => {
                let fields: Vec<&str> = trimmed.split_whitespace().collect();
                let normalized = match fields.as_slice() {
                    [minute, hour, day, month, weekday] => {
                        let weekday = crontab_weekdays(weekday).ok_or_else(|| MonitorError::Schedule {
                            expression: expression.to_string(),
                            reason: format!("invalid day-of-week field `{weekday}`"),
                        })?;
                        format!("0 {minute} {hour} {day} {month} {weekday}")
                    }
                    _ => trimmed.to_string(),
                };
                let schedule = cron::Schedule::from_str(&normalized).map_err(|e| MonitorError::Schedule {
                    expression: expression.to_string(),
                    reason: e.to_string(),
                })?;
                Cadence::Cron(Box::new(schedule))
            }
        };

        let schedule = Self { expression: trimmed.to_string(), cadence, timezone };
        if schedule.next_after(Utc::now()).is_none() {
            return Err(MonitorError::Schedule {
                expression: expression.to_string(),
                reason: "never fires".to_string(),
            });
        }

        Ok(schedule)
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// First firing strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.cadence {
            Cadence::Interval(period) => {
                let period = chrono::Duration::from_std(*period).ok()?;
                after.checked_add_signed(period)
            }
            Cadence::Cron(schedule) => schedule
                .after(&after.with_timezone(&self.timezone))
                .next()
                .map(|next| next.with_timezone(&Utc)),
        }
    }

    /// Gap between consecutive firings
    ///
    /// For cron this is measured between the next two firings, which is exact
    /// for regular expressions such as `*/5 * * * *`.
    pub fn period(&self) -> Duration {
        match &self.cadence {
            Cadence::Interval(period) => *period,
            Cadence::Cron(_) => {
                let now = Utc::now();
                self.next_after(now)
                    .and_then(|first| Some((first, self.next_after(first)?)))
                    .and_then(|(first, second)| (second - first).to_std().ok())
                    .unwrap_or(Duration::from_secs(300))
            }
        }
    }
}

/// Renumber a crontab day-of-week field (Sunday = 0 or 7) for the `cron`
/// crate (Sunday = 1). Named days pass through untouched.
fn crontab_weekdays(field: &str) -> Option<String> {
    if field == "*" || field == "?" || field.chars().any(|c| c.is_ascii_alphabetic()) {
        return Some(field.to_string());
    }

    let mut days = [false; 7];
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => (range, Some(step.parse::<usize>().ok().filter(|step| *step > 0)?)),
            None => (part, None),
        };

        let (first, last) = match (range, range.split_once('-')) {
            ("*", _) => (0, 6),
            (_, Some((first, last))) => (first.parse::<usize>().ok()?, last.parse::<usize>().ok()?),
            (single, None) => {
                let day = single.parse::<usize>().ok()?;
                (day, if step.is_some() { 6 } else { day })
            }
        };
        if first > last || last > 7 {
            return None;
        }

        for day in (first..=last).step_by(step.unwrap_or(1)) {
            days[day % 7] = true;
        }
    }

    let list: Vec<String> = (0..7).filter(|day| days[*day]).map(|day| (day + 1).to_string()).collect();
    Some(list.join(","))
}

fn parse_interval(raw: &str) -> Option<Duration> {
    let split = raw.find(|c: char| !c.is_ascii_digit())?;
    let (amount, unit) = raw.split_at(split);
    let amount: u64 = amount.parse().ok().filter(|amount| *amount > 0)?;

    let seconds = match unit.trim() {
        "s" | "sec" | "secs" | "seconds" => amount,
        "m" | "min" | "mins" | "minutes" => amount.checked_mul(60)?,
        "h" | "hour" | "hours" => amount.checked_mul(3600)?,
        _ => return None,
    };

    Some(Duration::from_secs(seconds))
}

/// Source of scheduler ticks
///
/// The production ticker sleeps until the schedule's next firing; tests
/// drive ticks by hand.
#[async_trait::async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick. `None` ends the scheduler loop.
    async fn tick(&mut self) -> Option<DateTime<Utc>>;

    /// When the next tick is expected, if known
    fn upcoming(&self) -> Option<DateTime<Utc>> {
        None
    }
}

/// Wall-clock ticker following a [`Schedule`]
pub struct ScheduleTicker {
    schedule: Schedule,
    last: Option<DateTime<Utc>>,
}

impl ScheduleTicker {
    pub fn new(schedule: Schedule) -> Self {
        Self { schedule, last: None }
    }

    fn base(&self) -> DateTime<Utc> {
        let now = Utc::now();
        // Never fire the same cron slot twice if we woke marginally early
        self.last.map_or(now, |last| last.max(now))
    }
}

#[async_trait::async_trait]
impl Ticker for ScheduleTicker {
    async fn tick(&mut self) -> Option<DateTime<Utc>> {
        let next = self.schedule.next_after(self.base())?;
        let wait = (next - Utc::now()).to_std().unwrap_or_default();

        tokio::time::sleep(wait).await;
        self.last = Some(next);
        Some(next)
    }

    fn upcoming(&self) -> Option<DateTime<Utc>> {
        self.schedule.next_after(self.base())
    }
}

/// Monitoring scheduler - fires a cycle on every tick
///
/// Each cycle (snapshot, unit spawning, reporting) runs on its own task, so
/// the loop goes straight back to waiting for the next tick. A slow or
/// stalled cycle may still be running when the next one starts.
pub struct MonitoringScheduler {
    runner: Arc<CycleRunner>,
    state: MonitorState,
    run_on_start: bool,
}

impl MonitoringScheduler {
    /// Create a new monitoring scheduler
    pub fn new(runner: Arc<CycleRunner>, state: MonitorState) -> Self {
        Self { runner, state, run_on_start: false }
    }

    /// Run one cycle immediately instead of waiting for the first tick
    pub fn run_on_start(mut self, enabled: bool) -> Self {
        self.run_on_start = enabled;
        self
    }

    /// Start the scheduler loop on the current runtime
    pub fn start<T>(self, ticker: T) -> SchedulerHandle
    where
        T: Ticker + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(ticker, shutdown_rx));

        SchedulerHandle { shutdown: shutdown_tx, task }
    }

    async fn run<T: Ticker>(self, mut ticker: T, mut shutdown: watch::Receiver<bool>) {
        info!("Monitoring scheduler started");

        if self.run_on_start {
            self.spawn_cycle().await;
        }

        loop {
            self.state.set_next_tick(ticker.upcoming()).await;

            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                tick = ticker.tick() => match tick {
                    Some(at) => {
                        info!(%at, "Scheduler tick");
                        self.spawn_cycle().await;
                    }
                    None => {
                        warn!("Ticker exhausted, stopping scheduler");
                        break;
                    }
                },
            }
        }

        self.state.set_next_tick(None).await;
        info!("Monitoring scheduler stopped");
    }

    /// Hand one cycle to its own task and return to waiting for ticks
    async fn spawn_cycle(&self) {
        self.state.record_dispatch().await;
        tokio::spawn(run_cycle(self.runner.clone(), self.state.clone()));
    }
}

async fn run_cycle(runner: Arc<CycleRunner>, state: MonitorState) {
    let dispatched = match runner.dispatch().await {
        Ok(dispatched) => dispatched,
        Err(e) => {
            error!(error = %e, "Monitoring cycle aborted");
            state.record_abort(e.to_string()).await;
            return;
        }
    };

    let report = dispatched.collect().await;
    info!(
        cycle = report.cycle,
        targets = report.targets,
        up = report.up,
        down = report.down,
        invalid_url = report.invalid_url,
        no_live_url = report.no_live_url,
        write_failures = report.write_failures,
        panicked = report.panicked,
        "Monitoring cycle finished"
    );
    state.record_report(report).await;
}

/// Owned handle to a running scheduler
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop accepting ticks and wait for the loop to exit
    ///
    /// Cycles already dispatched are left to finish on their own.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Scheduler task failed: {}", e);
        }
    }
}
