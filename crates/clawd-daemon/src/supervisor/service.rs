use super::cancellation::{CancellationToken, ShutdownSignal};
use super::launcher::{CommandLauncher, LaunchRequest, Launcher};
use super::types::{stopped_by_signal, RunExit, ServiceConfig};
use crate::events::{EventBus, SupervisorEvent};
use crate::logger::{LogWriter, RotatingLog};
use crate::pidfile::PidFile;
use crate::process::{ProcessControl, SystemProcess};
use crate::restart::RestartTracker;
use crate::state::StateStore;
use chrono::Utc;
use clawd_types::{ClawdError, ClawdResult, ServicePhase, StatusInfo, SUPERVISED_ENV};
use parking_lot::RwLock;
use std::fs::OpenOptions;
use std::future::Future;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Child;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// True when this process was launched by a supervisor.
pub fn is_supervised() -> bool {
    std::env::var(SUPERVISED_ENV)
        .map(|v| v == "1")
        .unwrap_or(false)
}

/// Supervises one gateway process per workspace.
pub struct Service {
    config: ServiceConfig,
    pid_file: PidFile,
    state: StateStore,
    tracker: RestartTracker,
    control: Arc<dyn ProcessControl>,
    launcher: Arc<dyn Launcher>,
    events: EventBus,
    phase: RwLock<ServicePhase>,
    /// Serializes start/stop/restart and holds the child spawned by `start`.
    child: Mutex<Option<Child>>,
    shutdown: ShutdownSignal,
}

impl Service {
    pub fn new(config: ServiceConfig) -> ClawdResult<Self> {
        Self::with_parts(
            config,
            Arc::new(SystemProcess::new()),
            Arc::new(CommandLauncher),
        )
    }

    pub fn with_parts(
        config: ServiceConfig,
        control: Arc<dyn ProcessControl>,
        launcher: Arc<dyn Launcher>,
    ) -> ClawdResult<Self> {
        let pid_file = PidFile::new(config.pid_path(), control.clone());
        let state = StateStore::new(config.state_path())?;
        let tracker = RestartTracker::new(config.restart_policy.clone());

        Ok(Self {
            config,
            pid_file,
            state,
            tracker,
            control,
            launcher,
            events: EventBus::default(),
            phase: RwLock::new(ServicePhase::Stopped),
            child: Mutex::new(None),
            shutdown: ShutdownSignal::new(),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn phase(&self) -> ServicePhase {
        *self.phase.read()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.events.subscribe()
    }

    /// Opens the workspace log with this service's rotation limits.
    pub fn open_log(&self) -> ClawdResult<RotatingLog> {
        Ok(RotatingLog::open(self.config.log.clone())?.with_events(self.events.clone()))
    }

    /// Spawns the gateway and returns its pid.
    pub async fn start(&self) -> ClawdResult<u32> {
        let mut held = self.child.lock().await;
        let (pid, child) = self.spawn_child().await?;
        *held = Some(child);
        Ok(pid)
    }

    pub async fn stop(&self) -> ClawdResult<()> {
        let mut held = self.child.lock().await;
        self.stop_locked(&mut held).await
    }

    /// Stops whatever is running (if anything), then starts afresh.
    pub async fn restart(&self) -> ClawdResult<u32> {
        let mut held = self.child.lock().await;

        match self.stop_locked(&mut held).await {
            Ok(()) => tokio::time::sleep(self.config.restart_settle).await,
            Err(e) if e.is_not_running() => debug!("Gateway was not running; starting fresh"),
            Err(e) => return Err(e),
        }

        let (pid, child) = self.spawn_child().await?;
        *held = Some(child);
        Ok(pid)
    }

    pub fn status(&self) -> StatusInfo {
        let state = self.state.get_state();
        let pid = self.pid_file.read();
        let running = pid != 0 && self.control.is_alive(pid);

        let uptime = if running {
            let probed = self.control.uptime(pid);
            if probed.is_zero() {
                state.uptime_at(Utc::now())
            } else {
                probed
            }
        } else {
            Duration::ZERO
        };

        let phase = match self.phase() {
            ServicePhase::Stopped if running => ServicePhase::Running,
            ServicePhase::Running if !running => ServicePhase::Stopped,
            phase => phase,
        };

        StatusInfo {
            running,
            pid: running.then_some(pid),
            phase,
            start_time: if running { state.start_time } else { None },
            uptime_secs: uptime.as_secs(),
            restart_count: state.restart_count,
            last_restart_time: state.last_restart_time,
            crash_count: state.crash_count,
            version: state.version,
            log_path: self.config.log.path.clone(),
        }
    }

    /// Zeroes the persisted restart counters and forgets crash history.
    pub fn reset_counters(&self) -> ClawdResult<()> {
        self.tracker.reset();
        self.state.reset_restart_count()?;
        self.state.reset_crash_window()?;
        info!("Restart counters reset");
        Ok(())
    }

    /// Ends `run_with_auto_restart` and `run`. Later calls have no effect.
    pub fn abort(&self) {
        if self.shutdown.trigger() {
            info!("Abort requested");
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Keeps the gateway alive until it exits deliberately, the crash budget
    /// runs out, or `abort` is called.
    pub async fn run_with_auto_restart(&self) -> ClawdResult<()> {
        let token = self.shutdown.token();
        let max_attempts = self.tracker.policy().max_attempts;
        let window = self.tracker.policy().window;

        loop {
            if token.is_cancelled() {
                return Err(self.aborted());
            }

            let started = Instant::now();
            let detail = match self.run_once(&token).await {
                Ok(RunExit::Deliberate) => {
                    info!("Gateway exited cleanly, not restarting");
                    self.set_phase(ServicePhase::Stopped);
                    return Ok(());
                }
                Ok(RunExit::Crashed { pid, detail }) => {
                    self.events.publish(SupervisorEvent::Crashed {
                        pid,
                        detail: detail.clone(),
                    });
                    detail
                }
                Err(ClawdError::Aborted) => return Err(self.aborted()),
                // Only a child that failed to come up counts as a crash;
                // registry, state and log errors end the loop as they are.
                Err(e @ (ClawdError::StartupFailed { .. } | ClawdError::Spawn { .. })) => {
                    e.to_string()
                }
                Err(e) => {
                    error!("Auto-restart loop stopped: {}", e);
                    self.set_phase(ServicePhase::Stopped);
                    return Err(e);
                }
            };
            self.set_phase(ServicePhase::Crashed);

            if started.elapsed() >= window {
                debug!("Gateway ran for a full window; forgiving earlier crashes");
                self.tracker.reset();
                self.state.reset_crash_window()?;
            }

            let delay = match self.tracker.record_attempt() {
                Ok(delay) => delay,
                Err(e) => return Err(self.give_up(e)),
            };
            let attempt = self.tracker.attempt_count();
            self.state.record_crash(window)?;

            if !self.tracker.should_restart() {
                return Err(self.give_up(self.tracker.limit_error()));
            }
            self.state.increment_restart_count()?;

            warn!(
                "Gateway crashed ({}), restarting in {:?} (attempt {}/{})",
                detail, delay, attempt, max_attempts
            );
            self.events.publish(SupervisorEvent::RestartScheduled {
                attempt,
                delay_ms: delay.as_millis() as u64,
            });

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = token.cancelled() => return Err(self.aborted()),
            }
        }
    }

    /// Runs `foreground` in this process until it returns or `abort` is
    /// called. Under supervision, own log output goes to the workspace log.
    pub async fn run<F, Fut>(&self, foreground: F) -> ClawdResult<()>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ClawdResult<()>>,
    {
        if is_supervised() {
            self.install_file_logging()?;
        }

        let token = self.shutdown.token();
        let work = foreground(token.clone());

        tokio::select! {
            result = work => result,
            _ = token.cancelled() => {
                info!("Foreground run cancelled");
                Ok(())
            }
        }
    }

    fn install_file_logging(&self) -> ClawdResult<()> {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;
        use tracing_subscriber::{fmt, EnvFilter};

        let log = Arc::new(self.open_log()?);
        let filter = EnvFilter::try_new(&self.config.log_level)
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let layer = fmt::layer()
            .with_writer(LogWriter::new(log))
            .with_ansi(false);

        if tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
            .is_err()
        {
            warn!("Tracing already initialized, not redirecting to {:?}", self.config.log.path);
        }
        Ok(())
    }

    /// One spawn-and-wait cycle of the auto-restart loop.
    async fn run_once(&self, token: &CancellationToken) -> ClawdResult<RunExit> {
        let (pid, child) = {
            let _serialized = self.child.lock().await;
            self.spawn_child().await?
        };

        let mut waiter = tokio::spawn(async move {
            let mut child = child;
            child.wait().await
        });

        tokio::select! {
            joined = &mut waiter => {
                match joined {
                    Ok(Ok(status)) => self.classify_exit(pid, status),
                    Ok(Err(e)) => Ok(RunExit::Crashed {
                        pid,
                        detail: format!("failed to wait for gateway: {}", e),
                    }),
                    Err(e) => Err(ClawdError::Internal(format!("wait task failed: {}", e))),
                }
            }
            _ = token.cancelled() => {
                info!("Stopping gateway (PID {}) on abort", pid);
                let mut held = self.child.lock().await;
                match self.stop_locked(&mut held).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_running() => {}
                    Err(e) => warn!("Failed to stop gateway on abort: {}", e),
                }
                let _ = waiter.await;
                Err(ClawdError::Aborted)
            }
        }
    }

    fn classify_exit(&self, pid: u32, status: ExitStatus) -> ClawdResult<RunExit> {
        let released = self.pid_file.read() != pid;

        if status.success() || stopped_by_signal(&status) || released {
            info!("Gateway (PID {}) exited: {}", pid, status);
            self.pid_file.remove_if_owned_by(pid)?;
            self.state.clear()?;
            return Ok(RunExit::Deliberate);
        }

        self.pid_file.remove_if_owned_by(pid)?;
        Ok(RunExit::Crashed {
            pid,
            detail: status.to_string(),
        })
    }

    /// Spawn plus boot verification. Callers hold `self.child`.
    async fn spawn_child(&self) -> ClawdResult<(u32, Child)> {
        if self.pid_file.is_process_running() {
            return Err(ClawdError::AlreadyRunning {
                pid: self.pid_file.read(),
                path: self.pid_file.path().to_path_buf(),
            });
        }

        self.set_phase(ServicePhase::Starting);
        let result = self.launch_verified().await;
        if result.is_err() {
            self.set_phase(ServicePhase::Stopped);
        }
        result
    }

    async fn launch_verified(&self) -> ClawdResult<(u32, Child)> {
        let log_path = self.config.log.path.clone();

        if self.open_log()?.rotate_if_oversized()? {
            info!("Rotated oversized log {:?}", log_path);
        }

        let output = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| ClawdError::io("open log", &log_path, e))?;

        let mut child = self.launcher.launch(LaunchRequest {
            program: self.config.executable.clone(),
            args: self.config.command_args(),
            output,
        })?;

        let Some(pid) = child.id() else {
            let status = child.wait().await.ok();
            return Err(ClawdError::StartupFailed {
                pid: 0,
                log_path,
                detail: format!("exited before reporting a pid ({:?})", status),
            });
        };

        if let Err(e) = self.pid_file.write_pid(pid) {
            warn!("Could not record gateway PID {}, killing it", pid);
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(e);
        }

        tokio::time::sleep(self.config.boot_grace).await;

        match child.try_wait() {
            Ok(Some(status)) => {
                self.pid_file.remove_if_owned_by(pid)?;
                return Err(ClawdError::StartupFailed {
                    pid,
                    log_path,
                    detail: format!("exited during boot ({})", status),
                });
            }
            Ok(None) => {}
            Err(e) => warn!("Could not check gateway (PID {}) after boot: {}", pid, e),
        }

        let now = Utc::now();
        if let Err(e) = self.state.record_start(pid, now, &self.config.version) {
            error!("Failed to persist run-state, stopping gateway (PID {})", pid);
            let _ = child.start_kill();
            let _ = child.wait().await;
            let _ = self.pid_file.remove_if_owned_by(pid);
            return Err(e);
        }

        info!("Gateway started (PID {}, log {:?})", pid, log_path);
        self.events.publish(SupervisorEvent::Started { pid, at: now });
        self.set_phase(ServicePhase::Running);
        Ok((pid, child))
    }

    async fn stop_locked(&self, held: &mut Option<Child>) -> ClawdResult<()> {
        // Reap an exited child of ours so the probe below does not see a zombie.
        if let Some(child) = held.as_mut() {
            if let Ok(Some(_)) = child.try_wait() {
                *held = None;
            }
        }

        let pid = self.pid_file.read();
        if pid == 0 {
            return Err(ClawdError::NotRunning);
        }

        if !self.control.is_alive(pid) {
            debug!("Removing stale PID file for {}", pid);
            self.clear_records()?;
            self.set_phase(ServicePhase::Stopped);
            return Err(ClawdError::NotRunning);
        }

        self.set_phase(ServicePhase::Stopping);
        info!("Stopping gateway (PID {})", pid);

        let stopped = self.signal_and_wait(held, pid).await;
        let cleared = self.clear_records();
        self.set_phase(ServicePhase::Stopped);

        let forced = stopped?;
        cleared?;

        self.events.publish(SupervisorEvent::Stopped { pid, forced });
        info!("Gateway stopped (PID {}{})", pid, if forced { ", killed" } else { "" });
        Ok(())
    }

    /// Returns whether a force-kill was needed.
    async fn signal_and_wait(&self, held: &mut Option<Child>, pid: u32) -> ClawdResult<bool> {
        self.control.terminate(pid)?;

        if self.wait_for_exit(held, pid, self.config.stop_timeout).await {
            return Ok(false);
        }

        warn!(
            "Gateway (PID {}) did not exit within {:?}, killing",
            pid, self.config.stop_timeout
        );
        self.control.kill(pid)?;
        if !self.wait_for_exit(held, pid, KILL_REAP_TIMEOUT).await {
            warn!("Gateway (PID {}) still present after kill", pid);
        }
        Ok(true)
    }

    async fn wait_for_exit(&self, held: &mut Option<Child>, pid: u32, timeout: Duration) -> bool {
        if let Some(child) = held.as_mut() {
            if child.id() == Some(pid) {
                if tokio::time::timeout(timeout, child.wait()).await.is_ok() {
                    *held = None;
                    return true;
                }
                return false;
            }
        }

        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if !self.control.is_alive(pid) {
                return true;
            }
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }
        !self.control.is_alive(pid)
    }

    fn clear_records(&self) -> ClawdResult<()> {
        let removed = self.pid_file.remove();
        let cleared = self.state.clear();
        removed.and(cleared)
    }

    fn give_up(&self, err: ClawdError) -> ClawdError {
        error!("Gateway crash loop, giving up: {}", err);
        if let ClawdError::MaxRestartsExceeded { attempts, .. } = &err {
            self.events.publish(SupervisorEvent::CrashLoopAborted {
                attempts: *attempts,
            });
        }
        self.set_phase(ServicePhase::CrashLoopAborted);
        err
    }

    fn aborted(&self) -> ClawdError {
        info!("Auto-restart loop aborted");
        self.events.publish(SupervisorEvent::Aborted);
        self.set_phase(ServicePhase::Stopped);
        ClawdError::Aborted
    }

    fn set_phase(&self, to: ServicePhase) {
        let from = std::mem::replace(&mut *self.phase.write(), to);
        if from != to {
            debug!("Service phase {} -> {}", from, to);
            self.events
                .publish(SupervisorEvent::PhaseChanged { from, to });
        }
    }
}
