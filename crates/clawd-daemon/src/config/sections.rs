use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Program to supervise; the running `clawd` binary when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
    pub subcommand: String,
    pub args: Vec<String>,
    pub heartbeat_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            executable: None,
            subcommand: "gateway".into(),
            args: Vec::new(),
            heartbeat_secs: 60,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartConfig {
    pub max_attempts: u32,
    pub window_secs: u64,
    pub backoff_base_ms: u64,
    pub backoff_multiplier: f64,
    pub backoff_max_ms: u64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            window_secs: 300,
            backoff_base_ms: 1_000,
            backoff_multiplier: 2.0,
            backoff_max_ms: 30_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub max_size_bytes: u64,
    pub max_backups: usize,
    pub max_age_days: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            max_size_bytes: 100 * 1024 * 1024,
            max_backups: 3,
            max_age_days: 30,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub boot_grace_ms: u64,
    pub stop_timeout_secs: u64,
    /// Pause between stop and start during a restart so ports are released.
    pub restart_settle_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            boot_grace_ms: 100,
            stop_timeout_secs: 30,
            restart_settle_ms: 1_000,
        }
    }
}
