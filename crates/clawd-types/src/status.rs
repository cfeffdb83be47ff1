use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServicePhase {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    Crashed,
    CrashLoopAborted,
}

impl fmt::Display for ServicePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServicePhase::Stopped => write!(f, "stopped"),
            ServicePhase::Starting => write!(f, "starting"),
            ServicePhase::Running => write!(f, "running"),
            ServicePhase::Stopping => write!(f, "stopping"),
            ServicePhase::Crashed => write!(f, "crashed"),
            ServicePhase::CrashLoopAborted => write!(f, "crash-loop-aborted"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusInfo {
    pub running: bool,
    pub pid: Option<u32>,
    pub phase: ServicePhase,
    pub start_time: Option<DateTime<Utc>>,
    pub uptime_secs: u64,
    pub restart_count: u32,
    pub last_restart_time: Option<DateTime<Utc>>,
    pub crash_count: u32,
    pub version: String,
    pub log_path: PathBuf,
}

impl StatusInfo {
    pub fn uptime(&self) -> Duration {
        Duration::from_secs(self.uptime_secs)
    }
}

/// Renders a duration as `1d 2h 3m 4s`, dropping leading zero units.
pub fn format_uptime(d: Duration) -> String {
    let total = d.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    if days > 0 {
        format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

pub fn format_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = (now - then).to_std().unwrap_or_default();
    format!("{} ago", format_uptime(elapsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime_units() {
        assert_eq!(format_uptime(Duration::ZERO), "0s");
        assert_eq!(format_uptime(Duration::from_secs(45)), "45s");
        assert_eq!(format_uptime(Duration::from_secs(192)), "3m 12s");
        assert_eq!(format_uptime(Duration::from_secs(3_600 + 61)), "1h 1m 1s");
        assert_eq!(
            format_uptime(Duration::from_secs(2 * 86_400 + 3 * 3_600 + 4 * 60 + 5)),
            "2d 3h 4m 5s"
        );
    }

    #[test]
    fn test_format_ago() {
        let now = Utc::now();
        let then = now - chrono::Duration::seconds(90);
        assert_eq!(format_ago(then, now), "1m 30s ago");
        assert_eq!(format_ago(now + chrono::Duration::seconds(5), now), "0s ago");
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(ServicePhase::CrashLoopAborted.to_string(), "crash-loop-aborted");
        assert_eq!(ServicePhase::default(), ServicePhase::Stopped);
    }
}
