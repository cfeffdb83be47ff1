use clawd_types::{ClawdError, ClawdResult};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Writes `contents` next to `path` and renames it into place, so readers only
/// ever observe the previous or the new file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> ClawdResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ClawdError::io("create directory", parent, e))?;
    }

    let temp = temp_path(path);
    let result = write_temp(&temp, contents).and_then(|()| {
        fs::rename(&temp, path).map_err(|e| ClawdError::io("rename into place", path, e))
    });

    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

fn write_temp(temp: &Path, contents: &[u8]) -> ClawdResult<()> {
    let mut file = File::create(temp).map_err(|e| ClawdError::io("create temp file", temp, e))?;
    file.write_all(contents)
        .map_err(|e| ClawdError::io("write temp file", temp, e))?;
    file.sync_all()
        .map_err(|e| ClawdError::io("sync temp file", temp, e))
}

/// Removes `path`, treating a missing file as success.
pub fn remove_if_exists(path: &Path) -> ClawdResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ClawdError::io("remove", path, e)),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("clawd"));
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    name.push(format!(".{}.{}.tmp", std::process::id(), seq));
    path.with_file_name(name)
}
