use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::usage::UsageRecord;
use crate::error::ProbeError;

/// Shortest schedule the monitor accepts
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Availability of the Docker daemon as seen by the last probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubsystemStatus {
    #[default]
    Unknown,
    Available,
    NotInstalled,
    Unavailable,
}

impl SubsystemStatus {
    pub fn message(&self) -> &'static str {
        match self {
            SubsystemStatus::Unknown => "Checking Docker Status...",
            SubsystemStatus::Available => "Docker Running",
            SubsystemStatus::NotInstalled => "Docker Not Installed",
            SubsystemStatus::Unavailable => "Docker Not Running",
        }
    }
}

/// Warning/critical percentages. `critical >= warning` is enforced by the config layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub warning: u8,
    pub critical: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: 75,
            critical: 90,
        }
    }
}

/// Runtime settings the monitor reads at the start of every cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub thresholds: Thresholds,
    pub check_interval: Duration,
    pub notifications_enabled: bool,
    pub command_timeout: Duration,
    pub probe_image: String,
    pub docker_host: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            check_interval: Duration::from_secs(300),
            notifications_enabled: true,
            command_timeout: Duration::from_secs(30),
            probe_image: "alpine".to_string(),
            docker_host: None,
        }
    }
}

impl MonitorConfig {
    /// Clamp durations to their floors
    pub fn normalized(mut self) -> Self {
        self.check_interval = clamp_interval(self.check_interval);
        self.command_timeout = self.command_timeout.max(Duration::from_secs(1));
        self
    }
}

pub fn clamp_interval(interval: Duration) -> Duration {
    interval.max(MIN_CHECK_INTERVAL)
}

/// Snapshot published to observers after each cycle step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorState {
    pub status: SubsystemStatus,
    /// Absent unless the last usage probe succeeded while the daemon was available
    pub usage: Option<UsageRecord>,
    pub last_error: Option<ProbeError>,
}

impl MonitorState {
    pub fn has_error(&self) -> bool {
        self.last_error.is_some()
    }
}
