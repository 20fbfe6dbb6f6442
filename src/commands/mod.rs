// Command handlers module
pub mod check;
pub mod config;
pub mod notify;
pub mod status;
pub mod version;
pub mod watch;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::disk_monitor::{AlertSink, FileThrottleStore, MonitorRuntime};
use crate::core::Config;
use crate::ui::TerminalAlertSink;

/// Runtime wired to the user's config, throttle file and the terminal
pub(crate) fn build_runtime(config: &Config) -> Result<MonitorRuntime> {
    config.validate()?;

    let throttle = FileThrottleStore::default_location()?;
    let sink: Arc<dyn AlertSink> = Arc::new(TerminalAlertSink);

    MonitorRuntime::new(
        config.monitor_config(),
        config.get_docker_path().map(PathBuf::from),
        Arc::new(throttle),
        sink,
    )
    .context("Failed to start the monitor")
}

/// Remember where docker was found so the next run skips the lookup
pub(crate) fn persist_tool_path(config: &mut Config, resolved: Option<PathBuf>) {
    let resolved = resolved.map(|p| p.to_string_lossy().to_string());
    if resolved.is_none() || resolved == config.docker_path {
        return;
    }

    config.set_docker_path(resolved);
    if let Err(e) = config.save() {
        log::warn!("Failed to save docker path: {}", e);
    }
}

// Re-exports for cleaner imports
pub use version::execute as version;
