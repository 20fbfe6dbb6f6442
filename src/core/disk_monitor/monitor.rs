//! Scheduling and sequencing of probe cycles.
//!
//! A cycle runs status probe, usage probe, parser and alert policy in that
//! order. At most one cycle is in flight at any time: scheduled ticks and
//! forced checks that arrive while a cycle is running are dropped, not
//! queued. The one exception is a tick that finds a cycle left over from
//! before `stop`; it runs as soon as that cycle ends. State is published
//! through a `watch` channel once the daemon status is known and again once
//! usage has been resolved.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::alerts::{Alert, AlertSink};
use super::policy;
use super::probe::{docker_host_env, probe_usage, ProbeOutcome, StatusProbe};
use super::state::{clamp_interval, MonitorConfig, MonitorState, SubsystemStatus};
use super::throttle::ThrottleStore;
use super::usage::UsageRecord;
use crate::error::{DdmError, Result};

/// What happened to a requested check
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// The cycle ran and published this state
    Completed(MonitorState),
    /// Another cycle was already in flight, nothing was started
    Skipped,
    /// The cycle finished after `stop`/`shutdown` and its result was dropped
    Discarded,
}

/// Handle to the monitor. Clones share the same schedule and state.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<Inner>,
}

struct Inner {
    probe: StatusProbe,
    settings: RwLock<MonitorConfig>,
    throttle: Arc<dyn ThrottleStore>,
    sink: Arc<dyn AlertSink>,
    state_tx: watch::Sender<MonitorState>,
    control: Mutex<Control>,
    shutdown_tx: broadcast::Sender<()>,
    handle: Handle,
}

/// Schedule bookkeeping, guarded by one lock so that re-arming, stopping,
/// claiming a cycle and publishing never interleave.
#[derive(Default)]
struct Control {
    schedule: Option<Schedule>,
    next_epoch: u64,
    /// Bumped by `stop`; cycles started under an older value publish nothing
    generation: u64,
    /// Generation of the cycle in flight
    running: Option<u64>,
    /// Epoch of a schedule whose tick arrived while a stale cycle was running
    deferred_tick: Option<u64>,
    shut_down: bool,
}

impl Control {
    fn is_current_schedule(&self, epoch: u64) -> bool {
        !self.shut_down && self.schedule.as_ref().map(|s| s.epoch) == Some(epoch)
    }
}

struct Schedule {
    epoch: u64,
    interval: Duration,
    task: JoinHandle<()>,
}

/// The single-flight slot, taken under the control lock
struct Claim {
    guard: InFlightGuard,
    generation: u64,
    shutdown: broadcast::Receiver<()>,
}

/// Releases the single-flight slot when a cycle ends, however it ends.
/// Starts the deferred tick, if any, for the schedule that is still current.
struct InFlightGuard {
    inner: Arc<Inner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut control = self.inner.control.lock();
        control.running = None;

        let Some(epoch) = control.deferred_tick.take() else {
            return;
        };
        if !control.is_current_schedule(epoch) {
            return;
        }

        let claim = claim(&self.inner, &mut control);
        drop(control);

        log::debug!("Running tick deferred behind a stopped check");
        spawn_claimed(&self.inner, claim, false);
    }
}

/// Take the slot for a cycle tagged with the current generation.
/// The caller has checked that the slot is free.
fn claim(inner: &Arc<Inner>, control: &mut Control) -> Claim {
    control.running = Some(control.generation);
    Claim {
        guard: InFlightGuard {
            inner: inner.clone(),
        },
        generation: control.generation,
        shutdown: inner.shutdown_tx.subscribe(),
    }
}

fn spawn_claimed(inner: &Arc<Inner>, claim: Claim, forced: bool) -> JoinHandle<CheckOutcome> {
    let cycle_inner = inner.clone();
    let Claim {
        guard,
        generation,
        mut shutdown,
    } = claim;

    inner.handle.spawn(async move {
        let _guard = guard;
        tokio::select! {
            outcome = run_cycle(&cycle_inner, forced, generation) => outcome,
            _ = shutdown.recv() => {
                log::debug!("Check cancelled by shutdown");
                CheckOutcome::Discarded
            }
        }
    })
}

/// What a scheduled tick gets to do
enum Tick {
    Run(Claim),
    /// A current cycle is running; the tick is dropped
    Busy,
    /// A cycle from before `stop` is running; the tick runs when it ends
    Deferred,
    /// The schedule was replaced, stopped or shut down
    Cancelled,
}

impl Monitor {
    /// Create a monitor bound to the current Tokio runtime.
    ///
    /// Fails when called outside a runtime context.
    pub fn new(
        probe: StatusProbe,
        config: MonitorConfig,
        throttle: Arc<dyn ThrottleStore>,
        sink: Arc<dyn AlertSink>,
    ) -> Result<Self> {
        let handle = Handle::try_current().map_err(|_| {
            DdmError::runtime("monitor must be created inside a Tokio runtime")
        })?;

        let (state_tx, _) = watch::channel(MonitorState::default());
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            inner: Arc::new(Inner {
                probe,
                settings: RwLock::new(config.normalized()),
                throttle,
                sink,
                state_tx,
                control: Mutex::new(Control::default()),
                shutdown_tx,
                handle,
            }),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorState> {
        self.inner.state_tx.subscribe()
    }

    pub fn state(&self) -> MonitorState {
        self.inner.state_tx.borrow().clone()
    }

    pub fn config(&self) -> MonitorConfig {
        self.inner.settings.read().clone()
    }

    /// Path of the docker executable found by the last probe
    pub fn tool_path(&self) -> Option<PathBuf> {
        self.inner.probe.locator().cached()
    }

    pub fn is_running(&self) -> bool {
        self.inner.control.lock().schedule.is_some()
    }

    pub fn is_checking(&self) -> bool {
        self.inner.control.lock().running.is_some()
    }

    /// Replace the schedule: one cycle now, then one every `interval`
    pub fn start(&self, interval: Duration) {
        let interval = clamp_interval(interval);
        self.inner.settings.write().check_interval = interval;
        self.arm(interval, false);
    }

    /// Cancel the schedule. A cycle still in flight finishes but publishes nothing.
    pub fn stop(&self) {
        let mut control = self.inner.control.lock();
        if let Some(schedule) = control.schedule.take() {
            schedule.task.abort();
            log::info!("Monitoring stopped");
        }
        control.generation += 1;
        control.deferred_tick = None;
    }

    /// Stop and cancel any in-flight cycle, killing its subprocess
    pub fn shutdown(&self) {
        self.stop();
        self.inner.control.lock().shut_down = true;
        // Err only means no cycle is listening
        let _ = self.inner.shutdown_tx.send(());
    }

    /// Change the check interval. A running schedule is replaced at once.
    pub fn reconfigure_interval(&self, interval: Duration) {
        let interval = clamp_interval(interval);
        self.inner.settings.write().check_interval = interval;
        self.arm(interval, true);
    }

    /// Swap in new settings; thresholds apply from the next cycle
    pub fn update_config(&self, config: MonitorConfig) {
        let config = config.normalized();
        let interval = config.check_interval;
        *self.inner.settings.write() = config;
        self.arm(interval, true);
    }

    /// Run one forced cycle now and wait for it.
    ///
    /// Returns `Skipped` without starting anything if a cycle is already in flight.
    pub async fn force_check(&self) -> CheckOutcome {
        let claim = {
            let mut control = self.inner.control.lock();
            if control.shut_down {
                return CheckOutcome::Discarded;
            }
            if control.running.is_some() {
                return CheckOutcome::Skipped;
            }
            claim(&self.inner, &mut control)
        };

        spawn_claimed(&self.inner, claim, true)
            .await
            .unwrap_or_else(|e| {
                if !e.is_cancelled() {
                    log::error!("Check task failed: {}", e);
                }
                CheckOutcome::Discarded
            })
    }

    /// Status probe only. Publishes nothing and does not count as a cycle.
    pub async fn probe_status(&self) -> ProbeOutcome {
        let config = self.config();
        let env = docker_host_env(config.docker_host.as_deref());
        self.inner.probe.probe(&env, config.command_timeout).await
    }

    fn arm(&self, interval: Duration, only_if_running: bool) {
        let mut control = self.inner.control.lock();

        if control.shut_down {
            return;
        }
        if only_if_running {
            match &control.schedule {
                Some(schedule) if schedule.interval != interval => {}
                _ => return,
            }
        }

        if let Some(old) = control.schedule.take() {
            old.task.abort();
        }

        let epoch = control.next_epoch;
        control.next_epoch += 1;

        let task = self.inner.handle.spawn(schedule_loop(
            Arc::downgrade(&self.inner),
            epoch,
            interval,
            self.inner.shutdown_tx.subscribe(),
        ));

        control.schedule = Some(Schedule {
            epoch,
            interval,
            task,
        });

        log::info!("Monitoring every {}s", interval.as_secs());
    }

    fn claim_tick(&self, epoch: u64) -> Tick {
        let mut control = self.inner.control.lock();
        if !control.is_current_schedule(epoch) {
            return Tick::Cancelled;
        }

        match control.running {
            None => Tick::Run(claim(&self.inner, &mut control)),
            Some(running) if running != control.generation => {
                control.deferred_tick = Some(epoch);
                Tick::Deferred
            }
            Some(_) => Tick::Busy,
        }
    }
}

async fn schedule_loop(
    inner: Weak<Inner>,
    epoch: u64,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else { break };
                let monitor = Monitor { inner };

                match monitor.claim_tick(epoch) {
                    Tick::Run(claim) => {
                        spawn_claimed(&monitor.inner, claim, false);
                    }
                    Tick::Busy => log::debug!("Previous check still running, dropping tick"),
                    Tick::Deferred => log::debug!("Stopped check still running, deferring tick"),
                    Tick::Cancelled => break,
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

async fn run_cycle(inner: &Inner, forced: bool, generation: u64) -> CheckOutcome {
    let config = inner.settings.read().clone();
    let env = docker_host_env(config.docker_host.as_deref());

    log::debug!("Starting {} check", if forced { "forced" } else { "scheduled" });

    let outcome = inner.probe.probe(&env, config.command_timeout).await;

    let path = match (outcome.status, outcome.tool_path) {
        (SubsystemStatus::Available, Some(path)) => path,
        (status, _) => {
            if let Some(error) = &outcome.error {
                log::info!("{}: {}", status.message(), error);
            }
            return inner.publish(
                generation,
                MonitorState {
                    status,
                    usage: None,
                    last_error: outcome.error,
                },
            );
        }
    };

    if !inner.publish_status(generation) {
        return CheckOutcome::Discarded;
    }

    let usage = probe_usage(
        inner.probe.runner().as_ref(),
        &path,
        &config.probe_image,
        &env,
        config.command_timeout,
    )
    .await;

    match usage {
        Ok(usage) => {
            log::debug!("Docker disk usage at {}%", usage.use_percentage);
            let decision = inner.alert_decision(&usage, &config, forced);

            inner.publish_with_alert(
                generation,
                MonitorState {
                    status: SubsystemStatus::Available,
                    usage: Some(usage),
                    last_error: None,
                },
                decision,
            )
        }
        Err(error) => {
            log::warn!("Disk usage check failed: {}", error);
            // Stale usage must not be shown as current
            inner.publish(
                generation,
                MonitorState {
                    status: SubsystemStatus::Available,
                    usage: None,
                    last_error: Some(error),
                },
            )
        }
    }
}

impl Inner {
    fn publish(&self, generation: u64, state: MonitorState) -> CheckOutcome {
        self.publish_with_alert(generation, state, None)
    }

    /// Publish and, when given, record and deliver the alert. Both happen
    /// under the control lock, so a `stop` either precedes all of it or none.
    fn publish_with_alert(
        &self,
        generation: u64,
        state: MonitorState,
        decision: Option<policy::Decision>,
    ) -> CheckOutcome {
        let control = self.control.lock();
        if control.generation != generation {
            log::debug!("Dropping result of a check that outlived stop()");
            return CheckOutcome::Discarded;
        }

        if let (Some(decision), Some(usage)) = (decision, &state.usage) {
            if let Err(e) = self.throttle.save(&decision.throttle) {
                log::warn!("Failed to persist alert throttle state: {}", e);
            }
            self.sink
                .deliver(&Alert::new(decision.level, usage.use_percentage));
        }

        self.state_tx.send_replace(state.clone());
        drop(control);

        CheckOutcome::Completed(state)
    }

    /// Daemon is up: clear the error, keep the previous usage until the new one is known
    fn publish_status(&self, generation: u64) -> bool {
        let control = self.control.lock();
        if control.generation != generation {
            return false;
        }
        self.state_tx.send_modify(|state| {
            state.status = SubsystemStatus::Available;
            state.last_error = None;
        });
        true
    }

    /// Policy verdict for this reading; `None` when no alert is due
    fn alert_decision(
        &self,
        usage: &UsageRecord,
        config: &MonitorConfig,
        forced: bool,
    ) -> Option<policy::Decision> {
        if !config.notifications_enabled {
            return None;
        }

        let throttle = self.throttle.load();
        let decision = policy::evaluate(
            usage.use_percentage,
            &config.thresholds,
            &throttle,
            forced,
            Utc::now(),
        );

        decision.should_alert.then_some(decision)
    }
}
