use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable snapshot of the supervised gateway, persisted as `gateway-state.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunState {
    pub pid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub restart_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_restart_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Informational only; restart decisions come from the in-memory tracker.
    pub crash_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_crash_time: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn uptime_at(&self, now: DateTime<Utc>) -> std::time::Duration {
        self.start_time
            .and_then(|start| (now - start).to_std().ok())
            .unwrap_or_default()
    }
}
