use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use ddmon::core::disk_monitor::{
    AlertLevel, CheckOutcome, MemoryThrottleStore, Monitor, MonitorConfig, StatusProbe,
    SubsystemStatus, ThrottleState, ThrottleStore,
};
use ddmon::ProbeError;

use super::support::{
    fake_tool, locator_for, output, wait_for_state, wait_until, RecordingSink, ScriptedRunner,
};

struct Harness {
    _dir: TempDir,
    runner: Arc<ScriptedRunner>,
    sink: Arc<RecordingSink>,
    throttle: Arc<MemoryThrottleStore>,
    monitor: Monitor,
}

fn harness(runner: ScriptedRunner, config: MonitorConfig) -> Harness {
    harness_with_throttle(runner, config, ThrottleState::default())
}

fn harness_with_throttle(
    runner: ScriptedRunner,
    config: MonitorConfig,
    throttle: ThrottleState,
) -> Harness {
    let dir = TempDir::new().unwrap();
    let tool = fake_tool(&dir);

    let runner = Arc::new(runner);
    let sink = Arc::new(RecordingSink::default());
    let throttle = Arc::new(MemoryThrottleStore::new(throttle));

    let probe = StatusProbe::new(runner.clone(), locator_for(&tool));
    let monitor = Monitor::new(probe, config, throttle.clone(), sink.clone()).unwrap();

    Harness {
        _dir: dir,
        runner,
        sink,
        throttle,
        monitor,
    }
}

fn completed(outcome: CheckOutcome) -> ddmon::MonitorState {
    match outcome {
        CheckOutcome::Completed(state) => state,
        other => panic!("expected a completed check, got {:?}", other),
    }
}

#[test]
fn test_monitor_requires_runtime() {
    let dir = TempDir::new().unwrap();
    let tool = fake_tool(&dir);
    let probe = StatusProbe::new(Arc::new(ScriptedRunner::new(10)), locator_for(&tool));

    let result = Monitor::new(
        probe,
        MonitorConfig::default(),
        Arc::new(MemoryThrottleStore::default()),
        Arc::new(RecordingSink::default()),
    );
    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_force_check_publishes_usage_and_alerts() {
    let h = harness(ScriptedRunner::new(80), MonitorConfig::default());

    let state = completed(h.monitor.force_check().await);
    assert_eq!(state.status, SubsystemStatus::Available);
    assert!(state.last_error.is_none());

    let usage = state.usage.as_ref().unwrap();
    assert_eq!(usage.use_percentage, 80);
    assert_eq!(usage.filesystem, "overlay");
    assert_eq!(h.monitor.state(), state);

    let alerts = h.sink.delivered();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].level, AlertLevel::Warning);
    assert_eq!(alerts[0].percentage, 80);

    let saved = h.throttle.load();
    assert_eq!(saved.last_percentage, 80);
    assert!(saved.last_notified_at.is_some());

    assert!(h.monitor.tool_path().is_some());
    assert!(!h.monitor.is_checking());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_forced_check_ignores_time_throttle() {
    let recent = ThrottleState {
        last_percentage: 80,
        last_notified_at: Some(Utc::now() - ChronoDuration::minutes(1)),
    };
    let h = harness_with_throttle(ScriptedRunner::new(82), MonitorConfig::default(), recent);

    completed(h.monitor.force_check().await);

    assert_eq!(h.sink.delivered().len(), 1);
    assert_eq!(h.throttle.load().last_percentage, 82);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_below_warning_does_not_alert() {
    let h = harness(ScriptedRunner::new(40), MonitorConfig::default());

    let state = completed(h.monitor.force_check().await);
    assert_eq!(state.usage.unwrap().use_percentage, 40);
    assert!(h.sink.delivered().is_empty());
    assert_eq!(h.throttle.load(), ThrottleState::default());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_notifications_disabled_skips_policy() {
    let config = MonitorConfig {
        notifications_enabled: false,
        ..MonitorConfig::default()
    };
    let h = harness(ScriptedRunner::new(95), config);

    let state = completed(h.monitor.force_check().await);
    assert_eq!(state.usage.unwrap().use_percentage, 95);
    assert!(h.sink.delivered().is_empty());
    assert_eq!(h.throttle.load(), ThrottleState::default());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_daemon_failure_clears_usage() {
    let h = harness(ScriptedRunner::new(50), MonitorConfig::default());
    let state = completed(h.monitor.force_check().await);
    assert!(state.usage.is_some());

    h.runner.set_info(Err(ProbeError::command_failed(
        "Cannot connect to the Docker daemon",
    )));
    let state = completed(h.monitor.force_check().await);

    assert_eq!(state.status, SubsystemStatus::Unavailable);
    assert!(state.usage.is_none());
    assert_eq!(
        state.last_error,
        Some(ProbeError::ToolUnavailable(
            "Cannot connect to the Docker daemon".to_string()
        ))
    );
    // Usage is never attempted while the daemon is down
    assert_eq!(h.runner.usage_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status_timeout_reports_unavailable() {
    let h = harness(ScriptedRunner::new(50), MonitorConfig::default());
    h.runner
        .set_info(Err(ProbeError::Timeout(Duration::from_secs(30))));

    let state = completed(h.monitor.force_check().await);
    assert_eq!(state.status, SubsystemStatus::Unavailable);
    assert_eq!(
        state.last_error,
        Some(ProbeError::Timeout(Duration::from_secs(30)))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unparseable_usage_clears_usage() {
    let h = harness(ScriptedRunner::new(50), MonitorConfig::default());
    completed(h.monitor.force_check().await);

    h.runner.set_usage(output("Unable to find image 'alpine:latest' locally\n"));
    let state = completed(h.monitor.force_check().await);

    assert_eq!(state.status, SubsystemStatus::Available);
    assert!(state.usage.is_none());
    assert_eq!(state.last_error, Some(ProbeError::ParseFailed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_usage_command_failure_keeps_daemon_available() {
    let h = harness(ScriptedRunner::new(50), MonitorConfig::default());
    h.runner
        .set_usage(Err(ProbeError::command_failed("pull access denied")));

    let state = completed(h.monitor.force_check().await);
    assert_eq!(state.status, SubsystemStatus::Available);
    assert!(state.usage.is_none());
    assert_eq!(
        state.last_error,
        Some(ProbeError::CommandFailed("pull access denied".to_string()))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_force_check_while_in_flight_is_skipped() {
    let h = harness(ScriptedRunner::gated(60), MonitorConfig::default());

    let monitor = h.monitor.clone();
    let first = tokio::spawn(async move { monitor.force_check().await });
    h.runner.usage_started.notified().await;
    assert!(h.monitor.is_checking());

    assert_eq!(h.monitor.force_check().await, CheckOutcome::Skipped);

    h.runner.release();
    let state = completed(first.await.unwrap());
    assert_eq!(state.usage.unwrap().use_percentage, 60);

    assert_eq!(h.runner.info_calls(), 1);
    assert_eq!(h.runner.usage_calls(), 1);
    assert!(!h.monitor.is_checking());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status_is_published_before_usage() {
    let h = harness(ScriptedRunner::gated(60), MonitorConfig::default());
    let mut states = h.monitor.subscribe();

    let monitor = h.monitor.clone();
    let check = tokio::spawn(async move { monitor.force_check().await });

    let state = wait_for_state(&mut states, |s| s.status == SubsystemStatus::Available).await;
    assert!(state.usage.is_none());

    h.runner.release();
    completed(check.await.unwrap());
    assert!(h.monitor.state().usage.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_discards_in_flight_result() {
    let h = harness(ScriptedRunner::gated(95), MonitorConfig::default());

    let monitor = h.monitor.clone();
    let check = tokio::spawn(async move { monitor.force_check().await });
    h.runner.usage_started.notified().await;

    h.monitor.stop();
    h.runner.release();

    assert_eq!(check.await.unwrap(), CheckOutcome::Discarded);
    assert!(h.monitor.state().usage.is_none());
    assert!(h.sink.delivered().is_empty());

    // The monitor stays usable after stop
    h.runner.release();
    let state = completed(h.monitor.force_check().await);
    assert!(state.usage.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_during_stopped_check_still_runs_first_cycle() {
    let h = harness(ScriptedRunner::gated(40), MonitorConfig::default());
    let mut states = h.monitor.subscribe();

    h.monitor.start(Duration::from_secs(3600));
    h.runner.usage_started.notified().await;

    h.monitor.stop();
    h.monitor.start(Duration::from_secs(3600));
    // Let the new schedule's first tick arrive while the old check holds the slot
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.runner.info_calls(), 1);

    // One permit for the stopped check, one for the deferred tick
    h.runner.release();
    h.runner.release();

    let state = wait_for_state(&mut states, |s| s.usage.is_some()).await;
    assert_eq!(state.usage.unwrap().use_percentage, 40);
    assert_eq!(h.runner.info_calls(), 2);
    assert_eq!(h.runner.usage_calls(), 2);

    h.monitor.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_without_restart_drops_deferred_tick() {
    let h = harness(ScriptedRunner::gated(40), MonitorConfig::default());

    h.monitor.start(Duration::from_secs(3600));
    h.runner.usage_started.notified().await;

    h.monitor.stop();
    h.monitor.start(Duration::from_secs(3600));
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.monitor.stop();

    h.runner.release();
    h.runner.release();
    let runner = h.runner.clone();
    let monitor = h.monitor.clone();
    wait_until(move || !monitor.is_checking()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(runner.info_calls(), 1);
    assert!(h.monitor.state().usage.is_none());
}

/// Throttle store that stops the monitor the moment the policy reads it
#[derive(Default)]
struct StoppingThrottleStore {
    monitor: Mutex<Option<Monitor>>,
    saved: Mutex<Option<ThrottleState>>,
}

impl ThrottleStore for StoppingThrottleStore {
    fn load(&self) -> ThrottleState {
        if let Some(monitor) = self.monitor.lock().clone() {
            monitor.stop();
        }
        ThrottleState::default()
    }

    fn save(&self, state: &ThrottleState) -> ddmon::Result<()> {
        *self.saved.lock() = Some(*state);
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_during_alert_evaluation_suppresses_alert() {
    let dir = TempDir::new().unwrap();
    let tool = fake_tool(&dir);
    let runner = Arc::new(ScriptedRunner::new(95));
    let sink = Arc::new(RecordingSink::default());
    let throttle = Arc::new(StoppingThrottleStore::default());

    let status = StatusProbe::new(runner, locator_for(&tool));
    let monitor = Monitor::new(
        status,
        MonitorConfig::default(),
        throttle.clone(),
        sink.clone(),
    )
    .unwrap();
    *throttle.monitor.lock() = Some(monitor.clone());

    assert_eq!(monitor.force_check().await, CheckOutcome::Discarded);
    assert!(sink.delivered().is_empty());
    assert!(throttle.saved.lock().is_none());
    assert!(monitor.state().usage.is_none());

    // Break the monitor <-> store cycle
    throttle.monitor.lock().take();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_cancels_in_flight_check() {
    let h = harness(ScriptedRunner::gated(60), MonitorConfig::default());

    let monitor = h.monitor.clone();
    let check = tokio::spawn(async move { monitor.force_check().await });
    h.runner.usage_started.notified().await;

    h.monitor.shutdown();

    let outcome = tokio::time::timeout(Duration::from_secs(5), check)
        .await
        .expect("shutdown did not cancel the check")
        .unwrap();
    assert_eq!(outcome, CheckOutcome::Discarded);
    assert!(!h.monitor.is_checking());

    h.monitor.start(Duration::from_secs(60));
    assert!(!h.monitor.is_running());
    assert_eq!(h.monitor.force_check().await, CheckOutcome::Discarded);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_runs_first_cycle_immediately() {
    let h = harness(ScriptedRunner::new(30), MonitorConfig::default());
    let mut states = h.monitor.subscribe();

    h.monitor.start(Duration::from_secs(3600));
    assert!(h.monitor.is_running());

    let state = wait_for_state(&mut states, |s| s.usage.is_some()).await;
    assert_eq!(state.usage.unwrap().use_percentage, 30);

    h.monitor.stop();
    assert!(!h.monitor.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reconfigure_interval_rearms_schedule() {
    let h = harness(ScriptedRunner::new(30), MonitorConfig::default());
    let mut states = h.monitor.subscribe();

    h.monitor.start(Duration::from_secs(3600));
    wait_for_state(&mut states, |s| s.usage.is_some()).await;
    assert_eq!(h.runner.usage_calls(), 1);

    // Below the floor, clamped to one second
    h.monitor.reconfigure_interval(Duration::from_millis(10));
    assert_eq!(h.monitor.config().check_interval, Duration::from_secs(1));
    assert!(h.monitor.is_running());

    let runner = h.runner.clone();
    wait_until(move || runner.usage_calls() >= 2).await;

    h.monitor.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reconfigure_interval_when_stopped_does_not_start() {
    let h = harness(ScriptedRunner::new(30), MonitorConfig::default());

    h.monitor.reconfigure_interval(Duration::from_secs(60));
    assert!(!h.monitor.is_running());
    assert_eq!(h.monitor.config().check_interval, Duration::from_secs(60));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.runner.info_calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scheduled_repeat_is_throttled() {
    let h = harness(ScriptedRunner::new(80), MonitorConfig::default());
    let mut states = h.monitor.subscribe();

    h.monitor.start(Duration::from_secs(1));
    wait_for_state(&mut states, |s| s.usage.is_some()).await;
    assert_eq!(h.sink.delivered().len(), 1);

    h.runner.set_usage(output(&super::support::df_output(82)));
    wait_for_state(&mut states, |s| {
        s.usage.as_ref().map(|u| u.use_percentage) == Some(82)
    })
    .await;
    h.monitor.stop();

    // 80 -> 82 crosses nothing and the hour has not passed
    assert_eq!(h.sink.delivered().len(), 1);
    assert_eq!(h.throttle.load().last_percentage, 80);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_crossing_critical_alerts_again() {
    let recent = ThrottleState {
        last_percentage: 82,
        last_notified_at: Some(Utc::now() - ChronoDuration::minutes(5)),
    };
    let h = harness_with_throttle(ScriptedRunner::new(91), MonitorConfig::default(), recent);
    let mut states = h.monitor.subscribe();

    h.monitor.start(Duration::from_secs(3600));
    wait_for_state(&mut states, |s| s.usage.is_some()).await;
    h.monitor.stop();

    let alerts = h.sink.delivered();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].level, AlertLevel::Critical);
    assert_eq!(h.throttle.load().last_percentage, 91);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_update_config_applies_new_thresholds() {
    let h = harness(ScriptedRunner::new(60), MonitorConfig::default());

    completed(h.monitor.force_check().await);
    assert!(h.sink.delivered().is_empty());

    let mut config = h.monitor.config();
    config.thresholds.warning = 50;
    config.thresholds.critical = 55;
    h.monitor.update_config(config);
    assert!(!h.monitor.is_running());

    completed(h.monitor.force_check().await);
    let alerts = h.sink.delivered();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].level, AlertLevel::Critical);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_docker_host_is_passed_to_commands() {
    let config = MonitorConfig {
        docker_host: Some("tcp://127.0.0.1:2375".to_string()),
        probe_image: "busybox".to_string(),
        ..MonitorConfig::default()
    };
    let h = harness(ScriptedRunner::new(10), config);

    completed(h.monitor.force_check().await);

    assert_eq!(
        *h.runner.last_env.lock(),
        vec![("DOCKER_HOST".to_string(), "tcp://127.0.0.1:2375".to_string())]
    );
    assert_eq!(
        *h.runner.last_args.lock(),
        vec!["run", "--rm", "busybox", "df", "-h"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_probe_status_does_not_publish() {
    let h = harness(ScriptedRunner::new(10), MonitorConfig::default());

    let outcome = h.monitor.probe_status().await;
    assert_eq!(outcome.status, SubsystemStatus::Available);
    assert!(outcome.error.is_none());

    assert_eq!(h.monitor.state().status, SubsystemStatus::Unknown);
    assert_eq!(h.runner.usage_calls(), 0);
}
