use clawd_types::{ClawdError, ClawdResult, SUPERVISED_ENV};
use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};

pub struct LaunchRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Receives both stdout and stderr.
    pub output: File,
}

/// Starts the supervised executable.
pub trait Launcher: Send + Sync {
    fn launch(&self, request: LaunchRequest) -> ClawdResult<Child>;
}

/// Spawns a detached child in its own process group with the supervision
/// marker set.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandLauncher;

impl Launcher for CommandLauncher {
    fn launch(&self, request: LaunchRequest) -> ClawdResult<Child> {
        let spawn_err = |source: std::io::Error| ClawdError::Spawn {
            program: request.program.clone(),
            source,
        };
        let stderr = request.output.try_clone().map_err(spawn_err)?;

        let mut command = Command::new(&request.program);
        command
            .args(&request.args)
            .env(SUPERVISED_ENV, "1")
            .stdin(Stdio::null())
            .stdout(Stdio::from(request.output))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(false);

        #[cfg(unix)]
        command.process_group(0);

        command.spawn().map_err(|source| ClawdError::Spawn {
            program: request.program,
            source,
        })
    }
}
