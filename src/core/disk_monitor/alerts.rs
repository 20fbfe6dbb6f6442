//! Alert requests and the sink that delivers them.
//!
//! The monitor only decides that an alert is due; displaying it is the
//! job of whatever `AlertSink` the application wires in.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::state::Thresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertLevel {
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn for_percentage(percentage: u8, thresholds: &Thresholds) -> Self {
        if percentage >= thresholds.critical {
            AlertLevel::Critical
        } else {
            AlertLevel::Warning
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A disk usage alert ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub percentage: u8,
}

impl Alert {
    pub fn new(level: AlertLevel, percentage: u8) -> Self {
        Self { level, percentage }
    }

    pub fn title(&self) -> String {
        match self.level {
            AlertLevel::Warning => "Docker Disk Usage Warning".to_string(),
            AlertLevel::Critical => "Docker Disk Usage Critical".to_string(),
        }
    }

    pub fn body(&self) -> String {
        match self.level {
            AlertLevel::Warning => format!(
                "Docker disk usage is at {}%. You may want to clean up soon.",
                self.percentage
            ),
            AlertLevel::Critical => format!(
                "Docker disk is at {}% capacity! Consider cleaning up images and containers.",
                self.percentage
            ),
        }
    }

    /// Grouping key used by notification centers
    pub fn category(&self) -> String {
        format!("docker-disk-{}", self.level.as_str())
    }
}

/// Delivery side of alerting. Implementations must not block for long and
/// must not call back into the `Monitor`: `deliver` runs while the monitor
/// holds its schedule lock.
pub trait AlertSink: Send + Sync {
    fn deliver(&self, alert: &Alert);
}

/// Sink that reports alerts through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn deliver(&self, alert: &Alert) {
        log::warn!("{}: {}", alert.title(), alert.body());
    }
}
