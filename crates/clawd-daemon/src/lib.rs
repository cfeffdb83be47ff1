#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod atomic;
pub mod config;
pub mod events;
pub mod logger;
pub mod pidfile;
pub mod process;
pub mod restart;
pub mod state;
pub mod supervisor;

pub use config::{default_workspace, SupervisorConfig};
pub use events::{EventBus, SupervisorEvent};
pub use logger::{tail, LogConfig, LogWriter, RotatingLog};
pub use pidfile::PidFile;
pub use process::{ProcessControl, SystemProcess};
pub use restart::{RestartPolicy, RestartTracker};
pub use state::StateStore;
pub use supervisor::{
    is_supervised, CancellationToken, CommandLauncher, LaunchRequest, Launcher, RunExit, Service,
    ServiceConfig, ShutdownSignal,
};
