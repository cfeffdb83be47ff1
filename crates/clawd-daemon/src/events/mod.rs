use chrono::{DateTime, Utc};
use clawd_types::ServicePhase;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;

pub const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SupervisorEvent {
    PhaseChanged {
        from: ServicePhase,
        to: ServicePhase,
    },
    Started {
        pid: u32,
        at: DateTime<Utc>,
    },
    Stopped {
        pid: u32,
        forced: bool,
    },
    Crashed {
        pid: u32,
        detail: String,
    },
    RestartScheduled {
        attempt: u32,
        delay_ms: u64,
    },
    CrashLoopAborted {
        attempts: u32,
    },
    Aborted,
    LogRotated {
        path: PathBuf,
        backups: usize,
    },
}

/// Fan-out of supervisor events. Publishing never blocks; receivers that
/// fall more than the capacity behind observe `Lagged` and skip ahead.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<SupervisorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: SupervisorEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::default();
        bus.publish(SupervisorEvent::Aborted);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_each_subscriber_gets_a_copy() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(SupervisorEvent::Stopped {
            pid: 7,
            forced: false,
        });

        let expected = SupervisorEvent::Stopped {
            pid: 7,
            forced: false,
        };
        assert_eq!(a.recv().await.unwrap(), expected);
        assert_eq!(b.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let bus = EventBus::new(2);
        let mut slow = bus.subscribe();

        for attempt in 1..=5 {
            bus.publish(SupervisorEvent::RestartScheduled {
                attempt,
                delay_ms: 0,
            });
        }

        assert!(matches!(slow.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(
            slow.recv().await.unwrap(),
            SupervisorEvent::RestartScheduled {
                attempt: 4,
                delay_ms: 0
            }
        );
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_string(&SupervisorEvent::PhaseChanged {
            from: ServicePhase::Starting,
            to: ServicePhase::Running,
        })
        .unwrap();
        assert!(json.contains("\"event\":\"phase_changed\""));
        assert!(json.contains("\"to\":\"running\""));
    }
}
