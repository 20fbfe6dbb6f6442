use anyhow::Result;
use colored::Colorize;

use crate::core::disk_monitor::{Alert, AlertLevel, AlertSink};
use crate::core::Config;
use crate::ui::TerminalAlertSink;

/// Deliver a sample alert so the user can see what one looks like
pub fn execute() -> Result<()> {
    let config = Config::load()?;

    if !config.notifications_enabled {
        println!(
            "{}",
            "Notifications are disabled; enable them with 'ddmon config set notifications on'"
                .yellow()
        );
    }

    TerminalAlertSink.deliver(&Alert::new(AlertLevel::Warning, config.warning_threshold));
    println!();
    println!("{}", "Docker Disk Monitor notifications are working correctly!".green());

    Ok(())
}
