use super::{GatewayConfig, LoggingConfig, RestartConfig, TimeoutsConfig};
use crate::logger::LogConfig;
use crate::restart::RestartPolicy;
use crate::supervisor::ServiceConfig;
use clawd_types::{ClawdError, ClawdResult, DEFAULT_CONFIG_FILE_NAME, DEFAULT_LOG_FILE_NAME};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const ENV_HOME: &str = "CLAWD_HOME";
pub const ENV_LOG_LEVEL: &str = "CLAWD_LOG_LEVEL";
pub const ENV_MAX_RESTARTS: &str = "CLAWD_MAX_RESTARTS";
pub const ENV_GATEWAY_BIN: &str = "CLAWD_GATEWAY_BIN";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub gateway: GatewayConfig,
    pub restart: RestartConfig,
    pub logging: LoggingConfig,
    pub timeouts: TimeoutsConfig,
}

/// `$CLAWD_HOME`, else `~/.clawd`, else `./.clawd`.
pub fn default_workspace() -> PathBuf {
    if let Ok(home) = std::env::var(ENV_HOME) {
        if !home.is_empty() {
            return PathBuf::from(home);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".clawd")
}

pub fn config_path(workspace: &Path) -> PathBuf {
    workspace.join(DEFAULT_CONFIG_FILE_NAME)
}

impl SupervisorConfig {
    pub fn load(path: impl AsRef<Path>) -> ClawdResult<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ClawdError::Config(format!("Failed to read config: {}", e)))?;

            toml::from_str(&contents)
                .map_err(|e| ClawdError::Config(format!("Failed to parse config: {}", e)))?
        } else {
            info!("Config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> ClawdResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ClawdError::Config(format!("Failed to serialize config: {}", e)))?;

        crate::atomic::write_atomic(path.as_ref(), contents.as_bytes())?;

        info!("Configuration saved to {:?}", path.as_ref());
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides_from(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(level) = var(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }

        if let Some(max) = var(ENV_MAX_RESTARTS) {
            match max.parse() {
                Ok(n) => self.restart.max_attempts = n,
                Err(_) => warn!("Ignoring invalid {}={}", ENV_MAX_RESTARTS, max),
            }
        }

        if let Some(bin) = var(ENV_GATEWAY_BIN) {
            if !bin.is_empty() {
                self.gateway.executable = Some(PathBuf::from(bin));
            }
        }
    }

    pub fn validate(&self) -> ClawdResult<()> {
        let restart = &self.restart;

        if restart.max_attempts == 0 {
            return Err(ClawdError::Config("restart.max_attempts cannot be 0".into()));
        }

        if restart.window_secs == 0 {
            return Err(ClawdError::Config("restart.window_secs cannot be 0".into()));
        }

        if restart.backoff_multiplier.is_nan() || restart.backoff_multiplier < 1.0 {
            return Err(ClawdError::Config(format!(
                "restart.backoff_multiplier must be at least 1.0, got {}",
                restart.backoff_multiplier
            )));
        }

        if restart.backoff_base_ms > restart.backoff_max_ms {
            return Err(ClawdError::Config(format!(
                "restart.backoff_base_ms ({}) exceeds restart.backoff_max_ms ({})",
                restart.backoff_base_ms, restart.backoff_max_ms
            )));
        }

        if self.logging.max_size_bytes == 0 {
            return Err(ClawdError::Config("logging.max_size_bytes cannot be 0".into()));
        }

        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            return Err(ClawdError::Config(format!(
                "Invalid logging.level: {}",
                self.logging.level
            )));
        }

        if self.gateway.subcommand.trim().is_empty() {
            warn!("gateway.subcommand is empty; the executable will be launched with args only");
        }

        Ok(())
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        let r = &self.restart;
        RestartPolicy::default()
            .with_max_attempts(r.max_attempts)
            .with_window(Duration::from_secs(r.window_secs))
            .with_backoff(
                Duration::from_millis(r.backoff_base_ms),
                r.backoff_multiplier,
                Duration::from_millis(r.backoff_max_ms),
            )
    }

    pub fn log_config(&self, workspace: &Path) -> LogConfig {
        LogConfig {
            path: workspace.join(DEFAULT_LOG_FILE_NAME),
            max_size: self.logging.max_size_bytes,
            max_backups: self.logging.max_backups,
            max_age: Duration::from_secs(self.logging.max_age_days.saturating_mul(24 * 60 * 60)),
        }
    }

    /// Runtime settings for a service rooted at `workspace`. `version` is the
    /// build version recorded in run-state.
    pub fn service_config(&self, workspace: &Path, version: &str) -> ClawdResult<ServiceConfig> {
        let executable = match &self.gateway.executable {
            Some(path) => path.clone(),
            None => std::env::current_exe()
                .map_err(|e| ClawdError::Config(format!("Cannot locate own executable: {}", e)))?,
        };

        Ok(ServiceConfig {
            workspace: workspace.to_path_buf(),
            executable,
            subcommand: self.gateway.subcommand.clone(),
            args: self.gateway.args.clone(),
            version: version.to_string(),
            log_level: self.logging.level.clone(),
            restart_policy: self.restart_policy(),
            log: self.log_config(workspace),
            boot_grace: Duration::from_millis(self.timeouts.boot_grace_ms),
            stop_timeout: Duration::from_secs(self.timeouts.stop_timeout_secs),
            restart_settle: Duration::from_millis(self.timeouts.restart_settle_ms),
        })
    }
}
