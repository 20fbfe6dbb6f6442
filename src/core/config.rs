use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::disk_monitor::{MonitorConfig, Thresholds};

pub const DEFAULT_WARNING_THRESHOLD: u8 = 75;
pub const DEFAULT_CRITICAL_THRESHOLD: u8 = 90;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PROBE_IMAGE: &str = "alpine";

/// Intervals offered by the settings UI. Any positive value is accepted.
pub const SUGGESTED_INTERVALS_SECS: [u64; 5] = [60, 300, 600, 900, 1800];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub warning_threshold: u8,
    pub critical_threshold: u8,
    pub check_interval_secs: u64,
    pub notifications_enabled: bool,
    /// Last resolved docker executable, re-resolved when missing on disk
    pub docker_path: Option<String>,
    /// Overrides the per-user socket derived from the home directory
    pub docker_host: Option<String>,
    pub probe_image: String,
    pub command_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            critical_threshold: DEFAULT_CRITICAL_THRESHOLD,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            notifications_enabled: true,
            docker_path: None,
            docker_host: None,
            probe_image: DEFAULT_PROBE_IMAGE.to_string(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let data = fs::read(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        if data.is_empty() {
            return Ok(Config::default());
        }

        // A corrupted or outdated file falls back to defaults
        Ok(serde_json::from_slice(&data).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable config {:?}: {}", config_path, e);
            Config::default()
        }))
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let data = serde_json::to_vec_pretty(self).with_context(|| "Failed to serialize config")?;

        fs::write(config_path, data)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.json"))
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("ddmon"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.warning_threshold > 100 || self.critical_threshold > 100 {
            bail!("Thresholds must be between 0 and 100");
        }
        if self.critical_threshold < self.warning_threshold {
            bail!(
                "Critical threshold ({}%) must not be below warning threshold ({}%)",
                self.critical_threshold,
                self.warning_threshold
            );
        }
        if self.check_interval_secs == 0 {
            bail!("Check interval must be a positive number of seconds");
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            warning: self.warning_threshold,
            critical: self.critical_threshold,
        }
    }

    /// Build the runtime monitor settings from the persisted values
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            thresholds: self.thresholds(),
            check_interval: Duration::from_secs(self.check_interval_secs),
            notifications_enabled: self.notifications_enabled,
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            probe_image: self.probe_image.clone(),
            docker_host: self.docker_host.clone(),
        }
        .normalized()
    }

    pub fn set_docker_path(&mut self, path: Option<String>) {
        self.docker_path = path;
    }

    pub fn get_docker_path(&self) -> Option<&String> {
        self.docker_path.as_ref()
    }

    /// Apply a `key value` pair from the command line
    ///
    /// Leaves `self` untouched when the value is rejected.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let mut next = self.clone();
        match key {
            "warning" => next.warning_threshold = parse_percentage(value)?,
            "critical" => next.critical_threshold = parse_percentage(value)?,
            "interval" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid interval: {}", value))?;
                if secs == 0 {
                    bail!("Interval must be at least 1 second");
                }
                next.check_interval_secs = secs;
            }
            "notifications" => {
                next.notifications_enabled = match value {
                    "on" | "true" | "yes" | "1" => true,
                    "off" | "false" | "no" | "0" => false,
                    _ => bail!("Expected on/off, got: {}", value),
                }
            }
            "docker-path" => next.docker_path = optional_value(value),
            "docker-host" => next.docker_host = optional_value(value),
            "image" => {
                if value.trim().is_empty() {
                    bail!("Image name cannot be empty");
                }
                next.probe_image = value.trim().to_string();
            }
            "timeout" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid timeout: {}", value))?;
                next.command_timeout_secs = secs.max(1);
            }
            _ => bail!("Unknown config key: {}", key),
        }

        next.validate()?;
        *self = next;
        Ok(())
    }
}

fn parse_percentage(value: &str) -> Result<u8> {
    let pct: u8 = value
        .trim_end_matches('%')
        .parse()
        .with_context(|| format!("Invalid percentage: {}", value))?;
    if pct > 100 {
        bail!("Percentage must be between 0 and 100");
    }
    Ok(pct)
}

fn optional_value(value: &str) -> Option<String> {
    match value.trim() {
        "" | "none" | "auto" => None,
        v => Some(v.to_string()),
    }
}
