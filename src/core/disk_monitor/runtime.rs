//! Tokio runtime that hosts the monitor for synchronous callers.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::alerts::AlertSink;
use super::monitor::Monitor;
use super::probe::{StatusProbe, ToolLocator};
use super::runner::ProcessRunner;
use super::state::MonitorConfig;
use super::throttle::ThrottleStore;
use crate::error::{DdmError, Result};

/// Owns the worker threads and the monitor running on them.
///
/// Command execution happens on the runtime's workers, never on the
/// caller's thread.
pub struct MonitorRuntime {
    monitor: Monitor,
    shutdown_timeout: Duration,
    runtime: tokio::runtime::Runtime,
}

impl MonitorRuntime {
    /// Build a runtime with a monitor that runs real `docker` processes
    pub fn new(
        config: MonitorConfig,
        docker_path: Option<PathBuf>,
        throttle: Arc<dyn ThrottleStore>,
        sink: Arc<dyn AlertSink>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .thread_name("ddmon-worker")
            .build()
            .map_err(|e| DdmError::runtime(format!("Failed to start runtime: {}", e)))?;

        let shutdown_timeout = config.command_timeout;

        let monitor = {
            let _guard = runtime.enter();
            let probe = StatusProbe::new(
                Arc::new(ProcessRunner::new()),
                ToolLocator::docker(docker_path),
            );
            Monitor::new(probe, config, throttle, sink)?
        };

        log::debug!("MonitorRuntime initialized");

        Ok(Self {
            monitor,
            shutdown_timeout,
            runtime,
        })
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Drive a future to completion on the runtime
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Cancel in-flight work and wait, bounded by the command timeout, for workers to finish
    pub fn shutdown(self) {
        log::debug!("Shutting down MonitorRuntime");
        self.monitor.shutdown();
        self.runtime.shutdown_timeout(self.shutdown_timeout);
    }
}
