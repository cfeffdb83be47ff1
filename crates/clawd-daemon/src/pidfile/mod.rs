use crate::atomic::{remove_if_exists, write_atomic};
use crate::process::ProcessControl;
use clawd_types::{ClawdError, ClawdResult};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Records the one process that owns a workspace.
pub struct PidFile {
    path: PathBuf,
    control: Arc<dyn ProcessControl>,
    lock: Mutex<()>,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>, control: Arc<dyn ProcessControl>) -> Self {
        Self {
            path: path.into(),
            control,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self) -> ClawdResult<()> {
        self.write_pid(std::process::id())
    }

    /// Claims the workspace for `pid`. A stale record (dead pid) is overwritten.
    pub fn write_pid(&self, pid: u32) -> ClawdResult<()> {
        let _guard = self.lock.lock();

        if let Ok(existing) = self.read_locked() {
            if existing != pid && self.control.is_alive(existing) {
                return Err(ClawdError::AlreadyRunning {
                    pid: existing,
                    path: self.path.clone(),
                });
            }
            if existing != pid {
                debug!("Overwriting stale PID file {:?} (pid {})", self.path, existing);
            }
        }

        write_atomic(&self.path, pid.to_string().as_bytes())
    }

    /// Returns the recorded pid, or 0 when the file is absent or unreadable.
    pub fn read(&self) -> u32 {
        let _guard = self.lock.lock();
        self.read_locked().unwrap_or(0)
    }

    pub fn is_process_running(&self) -> bool {
        let _guard = self.lock.lock();
        match self.read_locked() {
            Ok(pid) => self.control.is_alive(pid),
            Err(_) => false,
        }
    }

    pub fn uptime(&self) -> Duration {
        let _guard = self.lock.lock();
        match self.read_locked() {
            Ok(pid) => self.control.uptime(pid),
            Err(_) => Duration::ZERO,
        }
    }

    pub fn remove(&self) -> ClawdResult<()> {
        let _guard = self.lock.lock();
        remove_if_exists(&self.path)
    }

    /// Removes the record only while it still names `pid`.
    pub fn remove_if_owned_by(&self, pid: u32) -> ClawdResult<bool> {
        let _guard = self.lock.lock();
        match self.read_locked() {
            Ok(current) if current == pid => {
                remove_if_exists(&self.path)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn read_locked(&self) -> Result<u32, String> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| e.to_string())?;
        let pid: u32 = contents
            .trim()
            .parse()
            .map_err(|e| format!("invalid PID in file: {}", e))?;
        if pid == 0 {
            return Err("invalid PID in file: 0".into());
        }
        Ok(pid)
    }
}
