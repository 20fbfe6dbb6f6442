//! Alert throttling.
//!
//! Scheduled checks alert when usage crosses the warning or critical
//! threshold since the last alert, or at most once an hour while usage
//! stays at or above the warning threshold. Forced checks skip the time
//! throttle entirely.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::alerts::AlertLevel;
use super::state::Thresholds;

/// Minimum spacing between repeated alerts for unchanged usage
pub const RENOTIFY_AFTER_SECS: i64 = 3600;

/// What was last alerted on. Persisted between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleState {
    pub last_percentage: u8,
    pub last_notified_at: Option<DateTime<Utc>>,
}

/// Outcome of one policy evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub should_alert: bool,
    pub level: AlertLevel,
    /// Equal to the input state unless `should_alert` is set
    pub throttle: ThrottleState,
}

pub fn evaluate(
    percentage: u8,
    thresholds: &Thresholds,
    throttle: &ThrottleState,
    forced: bool,
    now: DateTime<Utc>,
) -> Decision {
    let level = AlertLevel::for_percentage(percentage, thresholds);
    let above_warning = percentage >= thresholds.warning;

    let should_alert = if forced {
        above_warning
    } else {
        let last = throttle.last_percentage;
        let crossed_threshold = (last < thresholds.warning && above_warning)
            || (last < thresholds.critical && percentage >= thresholds.critical);

        let enough_time_passed = match throttle.last_notified_at {
            None => true,
            Some(at) => at < now - Duration::seconds(RENOTIFY_AFTER_SECS),
        };

        crossed_threshold || (enough_time_passed && above_warning)
    };

    let throttle = if should_alert {
        ThrottleState {
            last_percentage: percentage,
            last_notified_at: Some(now),
        }
    } else {
        *throttle
    };

    Decision {
        should_alert,
        level,
        throttle,
    }
}
