#![forbid(unsafe_code)]
#![warn(clippy::all)]

mod state;
mod status;

pub use state::RunState;
pub use status::{format_ago, format_uptime, ServicePhase, StatusInfo};

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PID_FILE_NAME: &str = "gateway.pid";

pub const DEFAULT_STATE_FILE_NAME: &str = "gateway-state.json";

pub const DEFAULT_LOG_FILE_NAME: &str = "gateway.log";

pub const DEFAULT_CONFIG_FILE_NAME: &str = "supervisor.toml";

/// Environment marker set on every supervised child.
pub const SUPERVISED_ENV: &str = "CLAWD_DAEMON";

#[derive(Error, Debug)]
pub enum ClawdError {
    #[error("gateway already running with PID {pid} (PID file: {})", path.display())]
    AlreadyRunning { pid: u32, path: PathBuf },

    #[error("gateway is not running")]
    NotRunning,

    #[error(
        "maximum restart attempts exceeded ({attempts}/{max_attempts} within {window:?}, last attempt at {last_attempt})"
    )]
    MaxRestartsExceeded {
        attempts: u32,
        max_attempts: u32,
        window: Duration,
        last_attempt: DateTime<Utc>,
    },

    #[error("gateway process {pid} failed to start: {detail} (check log file: {})", log_path.display())]
    StartupFailed {
        pid: u32,
        log_path: PathBuf,
        detail: String,
    },

    #[error("restart loop aborted")]
    Aborted,

    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to signal process {pid}: {detail}")]
    Signal { pid: u32, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt file: {0}")]
    Corrupt(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClawdError {
    pub fn io(op: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn is_not_running(&self) -> bool {
        matches!(self, Self::NotRunning)
    }

    pub fn already_running_pid(&self) -> Option<u32> {
        match self {
            Self::AlreadyRunning { pid, .. } => Some(*pid),
            _ => None,
        }
    }
}

pub type ClawdResult<T> = Result<T, ClawdError>;
