mod cancellation;
mod launcher;
mod service;
mod types;

pub use cancellation::{CancellationToken, ShutdownSignal};
pub use launcher::{CommandLauncher, LaunchRequest, Launcher};
pub use service::{is_supervised, Service};
pub use types::{RunExit, ServiceConfig};
