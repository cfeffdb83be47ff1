use crate::logger::LogConfig;
use crate::restart::RestartPolicy;
use clawd_types::{DEFAULT_LOG_FILE_NAME, DEFAULT_PID_FILE_NAME, DEFAULT_STATE_FILE_NAME};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

/// Everything a [`Service`](super::Service) needs, fixed at construction.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub workspace: PathBuf,
    pub executable: PathBuf,
    /// First argument passed to the executable; skipped when empty.
    pub subcommand: String,
    pub args: Vec<String>,
    pub version: String,
    pub log_level: String,
    pub restart_policy: RestartPolicy,
    pub log: LogConfig,
    pub boot_grace: Duration,
    pub stop_timeout: Duration,
    pub restart_settle: Duration,
}

impl ServiceConfig {
    pub fn new(workspace: impl Into<PathBuf>, executable: impl Into<PathBuf>) -> Self {
        let workspace = workspace.into();
        Self {
            log: LogConfig::new(workspace.join(DEFAULT_LOG_FILE_NAME)),
            workspace,
            executable: executable.into(),
            subcommand: "gateway".into(),
            args: Vec::new(),
            version: env!("CARGO_PKG_VERSION").into(),
            log_level: "info".into(),
            restart_policy: RestartPolicy::default(),
            boot_grace: Duration::from_millis(100),
            stop_timeout: Duration::from_secs(30),
            restart_settle: Duration::from_secs(1),
        }
    }

    pub fn pid_path(&self) -> PathBuf {
        self.workspace.join(DEFAULT_PID_FILE_NAME)
    }

    pub fn state_path(&self) -> PathBuf {
        self.workspace.join(DEFAULT_STATE_FILE_NAME)
    }

    pub fn log_path(&self) -> &Path {
        &self.log.path
    }

    /// Full argument vector: subcommand, then operator arguments.
    pub fn command_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        if !self.subcommand.is_empty() {
            args.push(self.subcommand.clone());
        }
        args.extend(self.args.iter().cloned());
        args
    }
}

/// How one supervised run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunExit {
    /// Stopped on purpose; the loop ends.
    Deliberate,
    Crashed { pid: u32, detail: String },
}

/// Exit statuses produced by a graceful stop request.
pub(crate) fn stopped_by_signal(status: &ExitStatus) -> bool {
    #[cfg(unix)]
    {
        use nix::sys::signal::Signal;
        use std::os::unix::process::ExitStatusExt;

        matches!(
            status.signal(),
            Some(sig) if sig == Signal::SIGTERM as i32 || sig == Signal::SIGINT as i32
        )
    }

    #[cfg(not(unix))]
    {
        let _ = status;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_args_prepend_subcommand() {
        let mut config = ServiceConfig::new("/ws", "/bin/gw");
        config.args = vec!["--port".into(), "9000".into()];
        assert_eq!(config.command_args(), vec!["gateway", "--port", "9000"]);

        config.subcommand.clear();
        assert_eq!(config.command_args(), vec!["--port", "9000"]);
    }

    #[test]
    fn test_workspace_paths() {
        let config = ServiceConfig::new("/ws", "/bin/gw");
        assert_eq!(config.pid_path(), PathBuf::from("/ws/gateway.pid"));
        assert_eq!(config.state_path(), PathBuf::from("/ws/gateway-state.json"));
        assert_eq!(config.log_path(), Path::new("/ws/gateway.log"));
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_classification() {
        use std::os::unix::process::ExitStatusExt;

        assert!(stopped_by_signal(&ExitStatus::from_raw(15)));
        assert!(stopped_by_signal(&ExitStatus::from_raw(2)));
        assert!(!stopped_by_signal(&ExitStatus::from_raw(9)));
        assert!(!stopped_by_signal(&ExitStatus::from_raw(1 << 8)));
    }
}
