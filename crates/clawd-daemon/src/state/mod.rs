use crate::atomic::{remove_if_exists, write_atomic};
use chrono::{DateTime, Utc};
use clawd_types::{ClawdError, ClawdResult, RunState};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Durable run-state, persisted on every mutation.
pub struct StateStore {
    path: PathBuf,
    state: RwLock<RunState>,
}

impl StateStore {
    /// Opens the store at `path`. A missing file starts empty; an unparseable one is an error.
    pub fn new(path: impl Into<PathBuf>) -> ClawdResult<Self> {
        let path = path.into();
        let state = Self::load(&path)?;
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    fn load(path: &Path) -> ClawdResult<RunState> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No run-state at {:?}, starting fresh", path);
                return Ok(RunState::default());
            }
            Err(e) => return Err(ClawdError::io("read", path, e)),
        };

        serde_json::from_str(&contents)
            .map_err(|e| ClawdError::Corrupt(format!("{}: {}", path.display(), e)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_state(&self) -> RunState {
        self.state.read().clone()
    }

    pub fn save(&self) -> ClawdResult<()> {
        // Exclusive so saves land in order.
        let state = self.state.write();
        self.persist(&state)
    }

    pub fn set_pid(&self, pid: u32) -> ClawdResult<()> {
        self.update(|s| s.pid = pid)
    }

    pub fn set_start_time(&self, time: DateTime<Utc>) -> ClawdResult<()> {
        self.update(|s| s.start_time = Some(time))
    }

    pub fn set_version(&self, version: &str) -> ClawdResult<()> {
        self.update(|s| s.version = version.to_string())
    }

    pub fn increment_restart_count(&self) -> ClawdResult<u32> {
        let mut state = self.state.write();
        state.restart_count = state.restart_count.saturating_add(1);
        state.last_restart_time = Some(Utc::now());
        self.persist(&state)?;
        Ok(state.restart_count)
    }

    pub fn reset_restart_count(&self) -> ClawdResult<()> {
        self.update(|s| {
            s.restart_count = 0;
            s.last_restart_time = None;
        })
    }

    /// Records a successful spawn in a single write.
    pub fn record_start(&self, pid: u32, time: DateTime<Utc>, version: &str) -> ClawdResult<()> {
        self.update(|s| {
            s.pid = pid;
            s.start_time = Some(time);
            s.version = version.to_string();
        })
    }

    /// Bumps the informational crash counter, opening a new window once the
    /// current one is older than `window`. Returns the count within the window.
    pub fn record_crash(&self, window: Duration) -> ClawdResult<u32> {
        self.record_crash_at(Utc::now(), window)
    }

    pub fn record_crash_at(&self, now: DateTime<Utc>, window: Duration) -> ClawdResult<u32> {
        let mut state = self.state.write();
        let window_expired = match state.first_crash_time {
            Some(first) => (now - first).to_std().map(|age| age > window).unwrap_or(false),
            None => true,
        };
        if window_expired {
            state.first_crash_time = Some(now);
            state.crash_count = 0;
        }
        state.crash_count = state.crash_count.saturating_add(1);
        self.persist(&state)?;
        Ok(state.crash_count)
    }

    pub fn reset_crash_window(&self) -> ClawdResult<()> {
        self.update(|s| {
            s.crash_count = 0;
            s.first_crash_time = None;
        })
    }

    /// Resets the in-memory state and deletes the backing file.
    pub fn clear(&self) -> ClawdResult<()> {
        let mut state = self.state.write();
        *state = RunState::default();
        remove_if_exists(&self.path)
    }

    pub fn uptime(&self) -> Duration {
        self.state.read().uptime_at(Utc::now())
    }

    fn update(&self, f: impl FnOnce(&mut RunState)) -> ClawdResult<()> {
        let mut state = self.state.write();
        f(&mut state);
        self.persist(&state)
    }

    fn persist(&self, state: &RunState) -> ClawdResult<()> {
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| ClawdError::Serialization(e.to_string()))?;
        write_atomic(&self.path, &json)
    }
}
