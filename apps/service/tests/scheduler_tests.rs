//! Scheduler lifecycle tests, driven by a manual ticker

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeRegistry, ManualTicker, RecordingChecker, Scripted, StalledRegistry, unknown};
use project_monitor::monitoring::{
    CycleRunner, MonitorState, MonitoringScheduler, StatusSnapshot, StatusValue, Target,
};

const WAIT: Duration = Duration::from_secs(2);

fn scheduler(
    registry: &Arc<FakeRegistry>,
    checker: &Arc<RecordingChecker>,
    timeout: Duration,
) -> (MonitoringScheduler, MonitorState) {
    let state = MonitorState::new("manual", "UTC");
    let runner = Arc::new(CycleRunner::new(registry.clone(), checker.clone(), timeout));
    (MonitoringScheduler::new(runner, state.clone()), state)
}

/// Poll the shared state until `ready` holds
async fn wait_for_state(state: &MonitorState, ready: impl Fn(&StatusSnapshot) -> bool) -> bool {
    tokio::time::timeout(WAIT, async {
        while !ready(&state.snapshot().await) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

#[tokio::test]
async fn test_each_tick_runs_a_cycle() {
    let registry =
        Arc::new(FakeRegistry::with_targets(vec![Target::new(1, "good", Some("https://good.example"), unknown())]));
    let checker = Arc::new(RecordingChecker::new(&[]));
    let (scheduler, state) = scheduler(&registry, &checker, Duration::from_secs(5));

    let (ticks, ticker) = ManualTicker::new();
    let handle = scheduler.start(ticker);

    // Nothing happens before the first tick
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(registry.list_calls(), 0);

    ticks.send(()).unwrap();
    assert!(registry.wait_for_updates(1, 1, WAIT).await);

    ticks.send(()).unwrap();
    assert!(registry.wait_for_updates(1, 2, WAIT).await);
    assert_eq!(registry.updates_for(1), vec![StatusValue::Up, StatusValue::Up]);

    handle.stop().await;

    let snapshot = state.snapshot().await;
    assert_eq!(snapshot.cycles_dispatched, 2);
    assert_eq!(snapshot.cycles_aborted, 0);
}

#[tokio::test]
async fn test_run_on_start_fires_without_tick() {
    let registry = Arc::new(FakeRegistry::with_targets(vec![Target::new(7, "cli", None, unknown())]));
    let checker = Arc::new(RecordingChecker::new(&[]));
    let (scheduler, _state) = scheduler(&registry, &checker, Duration::from_secs(5));

    let (_ticks, ticker) = ManualTicker::new();
    let handle = scheduler.run_on_start(true).start(ticker);

    assert!(registry.wait_for_updates(7, 1, WAIT).await);
    assert_eq!(registry.updates(), vec![(7, StatusValue::NoLiveUrl)]);

    handle.stop().await;
}

#[tokio::test]
async fn test_listing_failure_only_skips_that_cycle() {
    let registry =
        Arc::new(FakeRegistry::with_targets(vec![Target::new(1, "good", Some("https://good.example"), unknown())]));
    registry.fail_next_lists(1);
    let checker = Arc::new(RecordingChecker::new(&[]));
    let (scheduler, state) = scheduler(&registry, &checker, Duration::from_secs(5));

    let (ticks, ticker) = ManualTicker::new();
    let handle = scheduler.start(ticker);

    ticks.send(()).unwrap();
    assert!(registry.wait_for_list_calls(1, WAIT).await);

    ticks.send(()).unwrap();
    assert!(registry.wait_for_updates(1, 1, WAIT).await);
    assert!(handle.is_running());
    assert!(wait_for_state(&state, |s| s.cycles_aborted == 1).await);

    handle.stop().await;

    let snapshot = state.snapshot().await;
    assert_eq!(snapshot.cycles_dispatched, 2);
    assert_eq!(snapshot.cycles_aborted, 1);
    assert!(snapshot.last_abort.unwrap().contains("Registry unavailable"));
}

#[tokio::test]
async fn test_slow_cycle_does_not_block_next_tick() {
    let registry = Arc::new(FakeRegistry::with_targets(vec![
        Target::new(1, "stuck", Some("https://hang.example"), StatusValue::Up),
        Target::new(2, "good", Some("https://good.example"), unknown()),
    ]));
    let checker = Arc::new(RecordingChecker::new(&[("hang.example", Scripted::Hang)]));
    let (scheduler, _state) = scheduler(&registry, &checker, Duration::from_secs(30));

    let (ticks, ticker) = ManualTicker::new();
    let handle = scheduler.start(ticker);

    ticks.send(()).unwrap();
    assert!(registry.wait_for_updates(2, 1, WAIT).await);

    // Cycle 1's stuck unit is still in flight
    ticks.send(()).unwrap();
    assert!(registry.wait_for_updates(2, 2, WAIT).await);
    assert!(registry.updates_for(1).is_empty());
    assert_eq!(registry.list_calls(), 2);

    handle.stop().await;
}

#[tokio::test]
async fn test_stalled_listing_does_not_block_ticks_or_stop() {
    let registry = Arc::new(StalledRegistry::default());
    let checker = Arc::new(RecordingChecker::new(&[]));
    let state = MonitorState::new("manual", "UTC");
    let runner = Arc::new(CycleRunner::new(registry.clone(), checker, Duration::from_secs(5)));

    let (ticks, ticker) = ManualTicker::new();
    let handle = MonitoringScheduler::new(runner, state.clone()).start(ticker);

    ticks.send(()).unwrap();
    ticks.send(()).unwrap();

    // Both cycles get dispatched even though neither snapshot ever returns
    assert!(wait_for_state(&state, |s| s.cycles_dispatched == 2).await);
    assert!(tokio::time::timeout(WAIT, async {
        while registry.list_calls() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok());
    assert_eq!(state.snapshot().await.cycles_aborted, 0);

    tokio::time::timeout(WAIT, handle.stop()).await.expect("stop should not wait on a stalled cycle");
}

#[tokio::test]
async fn test_listing_timeout_aborts_only_that_cycle() {
    let registry = Arc::new(StalledRegistry::default());
    let checker = Arc::new(RecordingChecker::new(&[]));
    let state = MonitorState::new("manual", "UTC");
    let runner = Arc::new(
        CycleRunner::new(registry.clone(), checker, Duration::from_secs(5)).list_timeout(Duration::from_millis(50)),
    );

    let (ticks, ticker) = ManualTicker::new();
    let handle = MonitoringScheduler::new(runner, state.clone()).start(ticker);

    ticks.send(()).unwrap();
    assert!(wait_for_state(&state, |s| s.cycles_aborted == 1).await);

    ticks.send(()).unwrap();
    assert!(wait_for_state(&state, |s| s.cycles_aborted == 2).await);
    assert!(handle.is_running());

    let snapshot = state.snapshot().await;
    assert!(snapshot.last_abort.unwrap().contains("timed out"));

    handle.stop().await;
}

#[tokio::test]
async fn test_stop_ends_the_loop() {
    let registry =
        Arc::new(FakeRegistry::with_targets(vec![Target::new(1, "good", Some("https://good.example"), unknown())]));
    let checker = Arc::new(RecordingChecker::new(&[]));
    let (scheduler, state) = scheduler(&registry, &checker, Duration::from_secs(5));

    let (ticks, ticker) = ManualTicker::new();
    let handle = scheduler.start(ticker);
    assert!(handle.is_running());

    tokio::time::timeout(WAIT, handle.stop()).await.expect("stop should return promptly");

    // The ticker was dropped with the loop
    assert!(ticks.send(()).is_err());
    assert_eq!(registry.list_calls(), 0);
    assert_eq!(state.snapshot().await.next_tick, None);
}

#[tokio::test]
async fn test_exhausted_ticker_stops_scheduler() {
    let registry = Arc::new(FakeRegistry::default());
    let checker = Arc::new(RecordingChecker::new(&[]));
    let (scheduler, _state) = scheduler(&registry, &checker, Duration::from_secs(5));

    let (ticks, ticker) = ManualTicker::new();
    let handle = scheduler.start(ticker);
    drop(ticks);

    tokio::time::timeout(WAIT, async {
        while handle.is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("scheduler should stop once the ticker ends");

    handle.stop().await;
}
