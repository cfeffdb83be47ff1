#![cfg(unix)]

use clawd_daemon::{
    CommandLauncher, LaunchRequest, Launcher, ProcessControl, RestartPolicy, Service, ServiceConfig,
    SupervisorEvent, SystemProcess,
};
use clawd_types::{ClawdError, ClawdResult};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;

const STALE_PID: u32 = i32::MAX as u32 - 1;

#[derive(Default)]
struct CountingLauncher {
    launches: AtomicU32,
}

impl Launcher for CountingLauncher {
    fn launch(&self, request: LaunchRequest) -> ClawdResult<Child> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        CommandLauncher.launch(request)
    }
}

fn sh_config(workspace: &Path, script: &str) -> ServiceConfig {
    let mut config = ServiceConfig::new(workspace, "/bin/sh");
    config.subcommand = "-c".into();
    config.args = vec![script.into()];
    config.version = "it".into();
    config.boot_grace = Duration::from_millis(100);
    config.stop_timeout = Duration::from_secs(5);
    config.restart_settle = Duration::from_millis(10);
    config.restart_policy = RestartPolicy::default().with_backoff(
        Duration::from_millis(10),
        2.0,
        Duration::from_millis(40),
    );
    config
}

fn service_with_counter(config: ServiceConfig) -> (Service, Arc<CountingLauncher>) {
    let launcher = Arc::new(CountingLauncher::default());
    let service =
        Service::with_parts(config, Arc::new(SystemProcess::new()), launcher.clone()).unwrap();
    (service, launcher)
}

#[tokio::test]
async fn crash_loop_stops_after_three_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let (service, launcher) = service_with_counter(sh_config(dir.path(), "exit 1"));

    let err = service.run_with_auto_restart().await.unwrap_err();

    match err {
        ClawdError::MaxRestartsExceeded {
            attempts,
            max_attempts,
            window,
            ..
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(max_attempts, 3);
            assert_eq!(window, Duration::from_secs(300));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 3);

    // Three launches, two of them restarts; the last crash is not restarted.
    let state = service.state().get_state();
    assert_eq!(state.restart_count, 2);
    assert_eq!(state.crash_count, 3);
    assert!(state.last_restart_time.is_some());
    assert!(!service.status().running);
}

#[tokio::test]
async fn crash_after_boot_is_restarted() {
    let dir = tempfile::tempdir().unwrap();
    let (service, launcher) = service_with_counter(sh_config(dir.path(), "sleep 0.3; exit 2"));
    let mut events = service.subscribe();

    let err = service.run_with_auto_restart().await.unwrap_err();
    assert!(matches!(err, ClawdError::MaxRestartsExceeded { .. }));
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 3);

    let mut crashed = 0;
    let mut scheduled = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            SupervisorEvent::Crashed { .. } => crashed += 1,
            SupervisorEvent::RestartScheduled { attempt, delay_ms } => {
                scheduled.push((attempt, delay_ms))
            }
            _ => {}
        }
    }
    assert_eq!(crashed, 3);
    assert_eq!(scheduled, vec![(1, 10), (2, 20)]);
    assert!(!service.config().pid_path().exists());
}

#[tokio::test]
async fn unwritable_pid_registry_is_not_a_crash() {
    let dir = tempfile::tempdir().unwrap();
    let (service, launcher) = service_with_counter(sh_config(dir.path(), "sleep 30"));

    // A non-empty directory where the PID file belongs cannot be replaced.
    let pid_path = service.config().pid_path();
    std::fs::create_dir(&pid_path).unwrap();
    std::fs::write(pid_path.join("blocker"), "x").unwrap();

    let result = tokio::time::timeout(Duration::from_secs(10), service.run_with_auto_restart())
        .await
        .unwrap();

    match result {
        Err(ClawdError::Io { .. }) => {}
        other => panic!("expected the registry I/O error, got {other:?}"),
    }
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);

    let state = service.state().get_state();
    assert_eq!(state.restart_count, 0);
    assert_eq!(state.crash_count, 0);
}

#[tokio::test]
async fn clean_exit_ends_loop() {
    let dir = tempfile::tempdir().unwrap();
    let (service, launcher) = service_with_counter(sh_config(dir.path(), "sleep 0.3; exit 0"));

    service.run_with_auto_restart().await.unwrap();

    assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    assert_eq!(service.state().get_state().restart_count, 0);
    assert!(!service.config().pid_path().exists());
}

#[tokio::test]
async fn abort_during_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = sh_config(dir.path(), "exit 1");
    config.restart_policy = RestartPolicy::default().with_backoff(
        Duration::from_secs(30),
        2.0,
        Duration::from_secs(60),
    );
    let service = Arc::new(Service::new(config).unwrap());
    let mut events = service.subscribe();

    let aborter = {
        let service = service.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SupervisorEvent::RestartScheduled { .. }) => break,
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }
            service.abort();
        })
    };

    let result = tokio::time::timeout(Duration::from_secs(10), service.run_with_auto_restart())
        .await
        .expect("abort should interrupt the backoff sleep");
    assert!(matches!(result, Err(ClawdError::Aborted)));
    aborter.await.unwrap();

    // Abort is sticky.
    assert!(matches!(
        service.run_with_auto_restart().await,
        Err(ClawdError::Aborted)
    ));
}

#[tokio::test]
async fn abort_stops_running_child() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(Service::new(sh_config(dir.path(), "sleep 30")).unwrap());
    let mut events = service.subscribe();

    let aborter = {
        let service = service.clone();
        tokio::spawn(async move {
            let mut pid = 0;
            while let Ok(event) = events.recv().await {
                if let SupervisorEvent::Started { pid: started, .. } = event {
                    pid = started;
                    break;
                }
            }
            service.abort();
            pid
        })
    };

    let result = tokio::time::timeout(Duration::from_secs(10), service.run_with_auto_restart())
        .await
        .unwrap();
    assert!(matches!(result, Err(ClawdError::Aborted)));

    let pid = aborter.await.unwrap();
    assert_ne!(pid, 0);
    assert!(!SystemProcess::new().is_alive(pid));
    assert!(!service.config().pid_path().exists());
}

#[tokio::test]
async fn external_stop_is_deliberate() {
    let dir = tempfile::tempdir().unwrap();
    let config = sh_config(dir.path(), "sleep 30");
    let supervisor = Arc::new(Service::new(config.clone()).unwrap());
    let mut events = supervisor.subscribe();

    let looping = {
        let supervisor = supervisor.clone();
        tokio::spawn(async move { supervisor.run_with_auto_restart().await })
    };

    while let Ok(event) = events.recv().await {
        if matches!(event, SupervisorEvent::Started { .. }) {
            break;
        }
    }

    // A second handle on the same workspace, as the CLI would use.
    let operator = Service::new(config).unwrap();
    assert!(operator.status().running);
    operator.stop().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(10), looping)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(supervisor.state().get_state().restart_count, 0);
    assert!(!operator.status().running);
}

#[tokio::test]
async fn stale_pid_file_is_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let config = sh_config(dir.path(), "sleep 30");
    std::fs::write(config.pid_path(), STALE_PID.to_string()).unwrap();

    let service = Service::new(config).unwrap();
    assert!(!service.status().running);

    let pid = service.start().await.unwrap();
    assert_eq!(service.pid_file().read(), pid);

    let second = Service::new(service.config().clone()).unwrap();
    let err = second.start().await.unwrap_err();
    assert_eq!(err.already_running_pid(), Some(pid));

    service.stop().await.unwrap();
}

#[tokio::test]
async fn long_runs_forgive_earlier_crashes() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = sh_config(dir.path(), "sleep 0.4; exit 1");
    config.restart_policy = RestartPolicy::default()
        .with_max_attempts(2)
        .with_window(Duration::from_millis(300))
        .with_backoff(Duration::from_millis(10), 2.0, Duration::from_millis(10));
    let service = Arc::new(Service::new(config).unwrap());
    let mut events = service.subscribe();

    let aborter = {
        let service = service.clone();
        tokio::spawn(async move {
            let mut crashes = 0;
            while let Ok(event) = events.recv().await {
                if matches!(event, SupervisorEvent::Crashed { .. }) {
                    crashes += 1;
                    if crashes == 3 {
                        break;
                    }
                }
            }
            service.abort();
            crashes
        })
    };

    let result = tokio::time::timeout(Duration::from_secs(20), service.run_with_auto_restart())
        .await
        .unwrap();
    assert!(matches!(result, Err(ClawdError::Aborted)));
    assert_eq!(aborter.await.unwrap(), 3);
    assert!(service.state().get_state().restart_count >= 3);
}
