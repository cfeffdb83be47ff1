use super::ProcessControl;
use clawd_types::{ClawdError, ClawdResult};
use std::time::Duration;
use sysinfo::System;

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemProcess;

impl SystemProcess {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessControl for SystemProcess {
    fn is_alive(&self, pid: u32) -> bool {
        if pid == 0 {
            return false;
        }
        probe(pid)
    }

    fn uptime(&self, pid: u32) -> Duration {
        if pid == 0 {
            return Duration::ZERO;
        }
        let pid = sysinfo::Pid::from_u32(pid);
        let mut system = System::new();
        if !system.refresh_process(pid) {
            return Duration::ZERO;
        }
        system
            .process(pid)
            .map(|p| Duration::from_secs(p.run_time()))
            .unwrap_or_default()
    }

    fn terminate(&self, pid: u32) -> ClawdResult<()> {
        send(pid, true)
    }

    fn kill(&self, pid: u32) -> ClawdResult<()> {
        send(pid, false)
    }
}

#[cfg(unix)]
fn to_nix_pid(pid: u32) -> Option<nix::unistd::Pid> {
    i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .map(nix::unistd::Pid::from_raw)
}

#[cfg(unix)]
fn probe(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;

    let Some(pid) = to_nix_pid(pid) else {
        return false;
    };
    match kill(pid, None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(unix)]
fn send(pid: u32, graceful: bool) -> ClawdResult<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};

    let target = to_nix_pid(pid).ok_or_else(|| ClawdError::Signal {
        pid,
        detail: "invalid pid".into(),
    })?;
    let signal = if graceful { Signal::SIGTERM } else { Signal::SIGKILL };
    match kill(target, signal) {
        Ok(()) => Ok(()),
        // Already gone; the caller only wanted it dead.
        Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(ClawdError::Signal {
            pid,
            detail: format!("{}: {}", signal.as_str(), e),
        }),
    }
}

#[cfg(not(unix))]
fn probe(pid: u32) -> bool {
    let pid = sysinfo::Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_process(pid)
}

#[cfg(not(unix))]
fn send(pid: u32, _graceful: bool) -> ClawdResult<()> {
    let target = sysinfo::Pid::from_u32(pid);
    let mut system = System::new();
    if !system.refresh_process(target) {
        return Ok(());
    }
    match system.process(target) {
        Some(process) if !process.kill() => Err(ClawdError::Signal {
            pid,
            detail: "kill request rejected".into(),
        }),
        _ => Ok(()),
    }
}
