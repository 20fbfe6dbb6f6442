// DDMon Library - Public API

// Re-export error types
pub mod error;
pub use error::{DdmError, ProbeError, Result};

// Module declarations
pub mod commands;
pub mod core;
pub mod ui;

// Re-export commonly used types
pub use core::config::Config;
pub use core::disk_monitor::{Monitor, MonitorState, SubsystemStatus, UsageRecord};

// Initialize logging
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
