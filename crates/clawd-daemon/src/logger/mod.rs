mod writer;

pub use writer::LogWriter;

use crate::atomic::remove_if_exists;
use crate::events::{EventBus, SupervisorEvent};
use clawd_types::{ClawdError, ClawdResult};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

pub const DEFAULT_MAX_SIZE: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MAX_BACKUPS: usize = 3;
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub path: PathBuf,
    pub max_size: u64,
    pub max_backups: usize,
    pub max_age: Duration,
}

impl LogConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_size: DEFAULT_MAX_SIZE,
            max_backups: DEFAULT_MAX_BACKUPS,
            max_age: DEFAULT_MAX_AGE,
        }
    }

    /// Path of backup slot `index` (1 is the newest).
    pub fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}", index));
        self.path.with_file_name(name)
    }
}

struct ActiveFile {
    file: Option<File>,
    size: u64,
}

/// Append-only log file, rotated by size and pruned by age.
pub struct RotatingLog {
    config: LogConfig,
    active: Mutex<ActiveFile>,
    events: Option<EventBus>,
}

impl RotatingLog {
    pub fn open(config: LogConfig) -> ClawdResult<Self> {
        let log = Self {
            config,
            active: Mutex::new(ActiveFile {
                file: None,
                size: 0,
            }),
            events: None,
        };
        {
            let mut active = log.active.lock();
            log.open_active(&mut active)?;
        }
        Ok(log)
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn size(&self) -> u64 {
        self.active.lock().size
    }

    pub fn write(&self, message: &str) -> ClawdResult<()> {
        self.write_bytes(message.as_bytes())
    }

    /// Appends `buf`, rotating first when it would push the file past
    /// `max_size`. A failed rotation is annotated inline and the write proceeds.
    pub fn write_bytes(&self, buf: &[u8]) -> ClawdResult<()> {
        let mut active = self.active.lock();
        let incoming = buf.len() as u64;

        if active.size > 0 && active.size.saturating_add(incoming) > self.config.max_size {
            if let Err(e) = self.rotate_locked(&mut active) {
                let note = format!("[ERROR] Failed to rotate log: {}\n", e);
                self.append_locked(&mut active, note.as_bytes())?;
            }
        }

        self.append_locked(&mut active, buf)
    }

    pub fn rotate(&self) -> ClawdResult<()> {
        let mut active = self.active.lock();
        self.rotate_locked(&mut active)
    }

    /// Rotates when the file on disk has reached `max_size`. Other writers
    /// (the child's stdout) append behind our back, so the size is re-read.
    pub fn rotate_if_oversized(&self) -> ClawdResult<bool> {
        let mut active = self.active.lock();
        let on_disk = match fs::metadata(&self.config.path) {
            Ok(meta) => meta.len(),
            Err(_) => active.size,
        };
        active.size = on_disk;

        if on_disk < self.config.max_size {
            return Ok(false);
        }
        self.rotate_locked(&mut active)?;
        Ok(true)
    }

    /// Backup files currently present, newest first.
    pub fn backups(&self) -> Vec<PathBuf> {
        (1..)
            .map(|i| self.config.backup_path(i))
            .take_while(|p| p.exists())
            .collect()
    }

    fn rotate_locked(&self, active: &mut ActiveFile) -> ClawdResult<()> {
        // Close before renaming so no handle refers to the rotated path.
        active.file = None;

        let shifted = self.shift_backups().and_then(|()| self.prune_backups());
        let reopened = self.open_active(active);
        shifted?;
        reopened?;

        let backups = self.backups().len();
        debug!("Rotated {:?} ({} backups)", self.config.path, backups);
        if let Some(events) = &self.events {
            events.publish(SupervisorEvent::LogRotated {
                path: self.config.path.clone(),
                backups,
            });
        }
        Ok(())
    }

    fn shift_backups(&self) -> ClawdResult<()> {
        let path = &self.config.path;
        let max = self.config.max_backups;

        if max == 0 {
            return remove_if_exists(path);
        }

        let free = (1..=max)
            .find(|&i| !self.config.backup_path(i).exists())
            .unwrap_or(max);
        remove_if_exists(&self.config.backup_path(free))?;

        for i in (1..free).rev() {
            rename(&self.config.backup_path(i), &self.config.backup_path(i + 1))?;
        }

        if path.exists() {
            rename(path, &self.config.backup_path(1))?;
        }
        Ok(())
    }

    /// Drops backups past `max_backups` or older than `max_age`, then closes
    /// any gaps so numbering stays contiguous.
    fn prune_backups(&self) -> ClawdResult<()> {
        let now = SystemTime::now();
        let mut kept = Vec::new();

        for (slot, path) in self.backups().into_iter().enumerate() {
            let expired = fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .map(|age| age > self.config.max_age)
                .unwrap_or(false);

            if slot >= self.config.max_backups || expired {
                debug!("Removing old log backup {:?}", path);
                remove_if_exists(&path)?;
            } else {
                kept.push(path);
            }
        }

        for (i, path) in kept.iter().enumerate() {
            let target = self.config.backup_path(i + 1);
            if *path != target {
                rename(path, &target)?;
            }
        }
        Ok(())
    }

    fn open_active(&self, active: &mut ActiveFile) -> ClawdResult<()> {
        let path = &self.config.path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ClawdError::io("create directory", parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ClawdError::io("open log", path, e))?;
        active.size = file
            .metadata()
            .map_err(|e| ClawdError::io("stat log", path, e))?
            .len();
        active.file = Some(file);
        Ok(())
    }

    fn append_locked(&self, active: &mut ActiveFile, buf: &[u8]) -> ClawdResult<()> {
        if active.file.is_none() {
            self.open_active(active)?;
        }
        let path = &self.config.path;
        let Some(file) = active.file.as_mut() else {
            return Err(ClawdError::Internal("log file not open".into()));
        };

        file.write_all(buf)
            .map_err(|e| ClawdError::io("write log", path, e))?;
        file.sync_all()
            .map_err(|e| ClawdError::io("sync log", path, e))?;
        active.size = active.size.saturating_add(buf.len() as u64);
        Ok(())
    }
}

/// Last `lines` lines of the file at `path`; empty when it does not exist.
pub fn tail(path: &Path, lines: usize) -> ClawdResult<Vec<String>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ClawdError::io("read log", path, e)),
    };
    let text = String::from_utf8_lossy(&bytes);
    let all: Vec<&str> = text.lines().collect();
    let skip = all.len().saturating_sub(lines);
    Ok(all[skip..].iter().map(|l| l.to_string()).collect())
}

fn rename(from: &Path, to: &Path) -> ClawdResult<()> {
    fs::rename(from, to).map_err(|e| ClawdError::io("rename", from, e))
}
