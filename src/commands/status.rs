use anyhow::Result;
use colored::Colorize;

use super::{build_runtime, persist_tool_path};
use crate::core::disk_monitor::SubsystemStatus;
use crate::core::Config;

pub fn execute() -> Result<()> {
    let mut config = Config::load()?;

    let runtime = build_runtime(&config)?;
    let monitor = runtime.monitor().clone();
    let outcome = runtime.block_on(monitor.probe_status());
    persist_tool_path(&mut config, monitor.tool_path());
    runtime.shutdown();

    let message = outcome.status.message();
    match outcome.status {
        SubsystemStatus::Available => println!("{}", format!("✓ {}", message).green()),
        _ => println!("{}", format!("✗ {}", message).yellow()),
    }

    if let Some(path) = outcome.tool_path {
        println!("  {} {}", "Docker:".dimmed(), path.display());
    }
    if let Some(error) = outcome.error {
        println!("  {} {}", "Error:".dimmed(), error);
    }

    Ok(())
}
