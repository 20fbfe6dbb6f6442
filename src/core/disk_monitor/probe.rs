//! Docker discovery and the two probe commands.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::runner::{is_executable, CommandRunner};
use super::state::SubsystemStatus;
use super::usage::{parse_usage, UsageRecord};
use crate::error::ProbeError;

pub const DOCKER_BINARY: &str = "docker";

/// Install locations checked before falling back to a PATH lookup
pub const DOCKER_CANDIDATES: [&str; 3] = [
    "/usr/local/bin/docker",
    "/opt/homebrew/bin/docker",
    "/usr/bin/docker",
];

/// Finds the docker executable and remembers it.
///
/// A cached path is reused until it stops being executable. Candidates that
/// exist but cannot be executed are skipped. A failed lookup is never
/// cached, so installing Docker is picked up on the next cycle.
#[derive(Debug)]
pub struct ToolLocator {
    binary: String,
    candidates: Vec<PathBuf>,
    cached: Mutex<Option<PathBuf>>,
}

impl ToolLocator {
    pub fn new<S: Into<String>>(
        binary: S,
        candidates: Vec<PathBuf>,
        configured: Option<PathBuf>,
    ) -> Self {
        Self {
            binary: binary.into(),
            candidates,
            cached: Mutex::new(configured),
        }
    }

    /// Locator for docker, seeded with a previously resolved path
    pub fn docker(configured: Option<PathBuf>) -> Self {
        let candidates = DOCKER_CANDIDATES.iter().map(PathBuf::from).collect();
        Self::new(DOCKER_BINARY, candidates, configured)
    }

    pub fn resolve(&self) -> Option<PathBuf> {
        let mut cached = self.cached.lock();

        if let Some(path) = cached.as_ref() {
            if is_executable(path) {
                return Some(path.clone());
            }
            log::info!("Cached {} path {:?} is no longer executable, re-resolving", self.binary, path);
        }

        let found = self
            .candidates
            .iter()
            .find(|path| is_executable(path))
            .cloned()
            .or_else(|| which::which(&self.binary).ok());

        match &found {
            Some(path) => log::debug!("Resolved {} at {:?}", self.binary, path),
            None => log::debug!("{} not found in known locations or PATH", self.binary),
        }

        *cached = found.clone();
        found
    }

    /// Last successfully resolved path, without touching the filesystem
    pub fn cached(&self) -> Option<PathBuf> {
        self.cached.lock().clone()
    }
}

/// `DOCKER_HOST` override pointing at the per-user socket
pub fn docker_host_env(docker_host: Option<&str>) -> Vec<(String, String)> {
    let host = match docker_host {
        Some(host) => host.to_string(),
        None => {
            let home = std::env::var_os("HOME")
                .map(PathBuf::from)
                .or_else(dirs::home_dir);
            match home {
                Some(home) => format!("unix://{}/.docker/run/docker.sock", home.display()),
                None => return Vec::new(),
            }
        }
    };

    vec![("DOCKER_HOST".to_string(), host)]
}

/// Result of a status probe. `error` explains every status except `Available`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub status: SubsystemStatus,
    pub error: Option<ProbeError>,
    pub tool_path: Option<PathBuf>,
}

impl ProbeOutcome {
    fn not_installed() -> Self {
        Self {
            status: SubsystemStatus::NotInstalled,
            error: Some(ProbeError::ToolNotFound),
            tool_path: None,
        }
    }
}

/// Classifies daemon availability with `docker info`
pub struct StatusProbe {
    runner: Arc<dyn CommandRunner>,
    locator: ToolLocator,
}

impl StatusProbe {
    pub fn new(runner: Arc<dyn CommandRunner>, locator: ToolLocator) -> Self {
        Self { runner, locator }
    }

    pub fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }

    pub fn locator(&self) -> &ToolLocator {
        &self.locator
    }

    /// Never fails: every runner error maps to a status
    pub async fn probe(&self, env: &[(String, String)], timeout: Duration) -> ProbeOutcome {
        let Some(path) = self.locator.resolve() else {
            return ProbeOutcome::not_installed();
        };

        let args = vec!["info".to_string()];
        let (status, error) = match self.runner.run(&path, &args, env, timeout).await {
            Ok(_) => (SubsystemStatus::Available, None),
            Err(ProbeError::ToolNotFound) => {
                (SubsystemStatus::NotInstalled, Some(ProbeError::ToolNotFound))
            }
            Err(ProbeError::CommandFailed(detail)) => (
                SubsystemStatus::Unavailable,
                Some(ProbeError::tool_unavailable(detail)),
            ),
            Err(other) => (SubsystemStatus::Unavailable, Some(other)),
        };

        ProbeOutcome {
            status,
            error,
            tool_path: Some(path),
        }
    }
}

/// Arguments for the usage report: `df -h` inside a throwaway container
pub fn usage_args(image: &str) -> Vec<String> {
    ["run", "--rm", image, "df", "-h"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Run the usage report and parse it
pub async fn probe_usage(
    runner: &dyn CommandRunner,
    path: &Path,
    image: &str,
    env: &[(String, String)],
    timeout: Duration,
) -> Result<UsageRecord, ProbeError> {
    let args = usage_args(image);
    let output = runner.run(path, &args, env, timeout).await?;
    parse_usage(&output.stdout)
}
