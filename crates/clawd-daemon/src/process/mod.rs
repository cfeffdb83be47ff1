mod system;

pub use system::SystemProcess;

use clawd_types::ClawdResult;
use std::time::Duration;

/// Platform seam for everything the supervisor needs to know or do about an
/// OS process it did not necessarily spawn itself.
pub trait ProcessControl: Send + Sync {
    /// Existence probe. A process that exists but cannot be signalled counts as alive.
    fn is_alive(&self, pid: u32) -> bool;

    /// Best-effort time since the process started; zero when unknown.
    fn uptime(&self, pid: u32) -> Duration;

    /// Requests a graceful shutdown.
    fn terminate(&self, pid: u32) -> ClawdResult<()>;

    fn kill(&self, pid: u32) -> ClawdResult<()>;
}
