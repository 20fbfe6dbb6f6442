//! Docker disk usage monitoring.
//!
//! This module probes the Docker daemon with the `docker` CLI, parses the
//! `df` table reported from inside the Docker VM, and decides when a
//! threshold alert should be delivered.

pub mod alerts;
mod monitor;
pub mod policy;
pub mod probe;
pub mod runner;
mod runtime;
mod state;
pub mod throttle;
pub mod usage;

pub use alerts::{Alert, AlertLevel, AlertSink, LogAlertSink};
pub use monitor::{CheckOutcome, Monitor};
pub use policy::{evaluate, Decision, ThrottleState};
pub use probe::{ProbeOutcome, StatusProbe, ToolLocator};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};
pub use runtime::MonitorRuntime;
pub use state::{
    clamp_interval, MonitorConfig, MonitorState, SubsystemStatus, Thresholds, MIN_CHECK_INTERVAL,
};
pub use throttle::{FileThrottleStore, MemoryThrottleStore, ThrottleStore};
pub use usage::{parse_usage, UsageRecord};
