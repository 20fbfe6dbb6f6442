use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single probe step.
///
/// These are published to observers through `MonitorState::last_error`, so
/// they are cheap to clone and compare. None of them is fatal to the monitor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Docker is not installed or not found in PATH")]
    ToolNotFound,

    #[error("Docker daemon is not running: {0}")]
    ToolUnavailable(String),

    #[error("Docker command failed: {0}")]
    CommandFailed(String),

    #[error("Docker command timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Failed to parse Docker disk usage")]
    ParseFailed,
}

impl ProbeError {
    pub fn command_failed<S: Into<String>>(msg: S) -> Self {
        ProbeError::CommandFailed(msg.into())
    }

    pub fn tool_unavailable<S: Into<String>>(msg: S) -> Self {
        ProbeError::ToolUnavailable(msg.into())
    }

    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::ToolNotFound => "tool_not_found",
            ProbeError::ToolUnavailable(_) => "tool_unavailable",
            ProbeError::CommandFailed(_) => "command_failed",
            ProbeError::Timeout(_) => "timeout",
            ProbeError::ParseFailed => "parse_failed",
        }
    }
}

/// Custom error type for the ddmon application
#[derive(Error, Debug)]
pub enum DdmError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Result type alias for the ddmon application
pub type Result<T> = std::result::Result<T, DdmError>;

impl DdmError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        DdmError::Config(msg.into())
    }

    pub fn runtime<S: Into<String>>(msg: S) -> Self {
        DdmError::Runtime(msg.into())
    }
}
