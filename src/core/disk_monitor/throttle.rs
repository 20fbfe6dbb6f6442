//! Storage for the alert throttle state.

use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

use super::policy::ThrottleState;
use crate::error::{DdmError, Result};

/// Key-value collaborator that keeps `ThrottleState` across restarts.
///
/// The monitor writes only the state returned by a policy decision that
/// produced an alert.
pub trait ThrottleStore: Send + Sync {
    fn load(&self) -> ThrottleState;
    fn save(&self, state: &ThrottleState) -> Result<()>;
}

/// JSON file next to the config file
#[derive(Debug, Clone)]
pub struct FileThrottleStore {
    path: PathBuf,
}

impl FileThrottleStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Store under the user config directory
    pub fn default_location() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DdmError::config("Could not determine config directory"))?;
        Ok(Self::new(config_dir.join("ddmon").join("throttle.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Forget the last alert so the next check above the warning threshold alerts again
    pub fn reset(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl ThrottleStore for FileThrottleStore {
    fn load(&self) -> ThrottleState {
        let data = match fs::read(&self.path) {
            Ok(data) if !data.is_empty() => data,
            _ => return ThrottleState::default(),
        };

        serde_json::from_slice(&data).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable throttle state {:?}: {}", self.path, e);
            ThrottleState::default()
        })
    }

    fn save(&self, state: &ThrottleState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(state)?)?;
        Ok(())
    }
}

/// In-process store, for tests and embedders without persistence
#[derive(Debug, Default)]
pub struct MemoryThrottleStore {
    state: Mutex<ThrottleState>,
}

impl MemoryThrottleStore {
    pub fn new(initial: ThrottleState) -> Self {
        Self {
            state: Mutex::new(initial),
        }
    }
}

impl ThrottleStore for MemoryThrottleStore {
    fn load(&self) -> ThrottleState {
        *self.state.lock()
    }

    fn save(&self, state: &ThrottleState) -> Result<()> {
        *self.state.lock() = *state;
        Ok(())
    }
}
