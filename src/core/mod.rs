// Core business logic module

pub mod config;
pub mod disk_monitor;

// Re-export commonly used items
pub use config::Config;
pub use disk_monitor::{Monitor, MonitorRuntime, MonitorState};
