use chrono::{DateTime, Local, Utc};
use colored::{ColoredString, Colorize};

use crate::core::disk_monitor::{
    Alert, AlertLevel, AlertSink, MonitorState, SubsystemStatus, Thresholds, UsageRecord,
};

/// Gauge glyph for a usage percentage (quarter steps)
pub fn gauge_glyph(percentage: u8) -> &'static str {
    match percentage {
        0..=24 => "◔",
        25..=49 => "◑",
        50..=74 => "◕",
        _ => "●",
    }
}

/// Glyph for the whole monitor state; neutral unless usage is known
pub fn state_glyph(state: &MonitorState) -> &'static str {
    match (&state.status, &state.usage) {
        (SubsystemStatus::Available, Some(usage)) => gauge_glyph(usage.use_percentage),
        _ => "⚙",
    }
}

/// Percentage colored by threshold
pub fn format_percentage(percentage: u8, thresholds: &Thresholds) -> ColoredString {
    let text = format!("{}%", percentage);
    if percentage >= thresholds.critical {
        text.red().bold()
    } else if percentage >= thresholds.warning {
        text.yellow().bold()
    } else {
        text.green()
    }
}

/// One-line summary, used by `watch`
pub fn format_status_line(state: &MonitorState, thresholds: &Thresholds) -> String {
    let glyph = state_glyph(state);

    match (&state.status, &state.usage, &state.last_error) {
        (SubsystemStatus::Available, Some(usage), _) => format!(
            "{} Docker Disk Usage: {} ({} of {} used, {} available)",
            glyph,
            format_percentage(usage.use_percentage, thresholds),
            usage.used,
            usage.size,
            usage.available
        ),
        (status, _, Some(error)) => format!(
            "{} {} {}",
            glyph,
            status.message().yellow(),
            format!("({})", error).dimmed()
        ),
        (SubsystemStatus::Available, None, None) => format!("{} {}", glyph, "Loading...".dimmed()),
        (status, _, None) => format!("{} {}", glyph, status.message().yellow()),
    }
}

/// Multi-line report, used by `check`
pub fn print_state(state: &MonitorState, thresholds: &Thresholds) {
    println!("{}", format_status_line(state, thresholds));

    if let Some(usage) = &state.usage {
        print_usage(usage, thresholds);
    }
}

fn print_usage(usage: &UsageRecord, thresholds: &Thresholds) {
    println!();
    println!("  {} {}", "Filesystem:".dimmed(), usage.filesystem);
    println!("  {} {}", "Size:".dimmed(), usage.size);
    println!("  {} {}", "Used:".dimmed(), usage.used);
    println!("  {} {}", "Available:".dimmed(), usage.available);
    println!(
        "  {} {}",
        "Usage:".dimmed(),
        format_percentage(usage.use_percentage, thresholds)
    );
    println!("  {} {}", "Mounted:".dimmed(), usage.mounted_on);

    if !usage.percent_known {
        println!(
            "  {}",
            "Usage column could not be read; reported as 0%".yellow()
        );
    }
}

/// Format timestamp in local time (YYYY-MM-DD HH:MM)
pub fn format_time(time: DateTime<Utc>) -> String {
    let local: DateTime<Local> = time.into();
    local.format("%Y-%m-%d %H:%M").to_string()
}

/// Prints alerts to the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalAlertSink;

impl AlertSink for TerminalAlertSink {
    fn deliver(&self, alert: &Alert) {
        let title = match alert.level {
            AlertLevel::Warning => format!("⚠️  {}", alert.title()).yellow().bold(),
            AlertLevel::Critical => format!("🚨 {}", alert.title()).red().bold(),
        };
        println!("{}", title);
        println!("   {}", alert.body());
        log::info!("Delivered {} alert at {}%", alert.level, alert.percentage);
    }
}
