use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::gate::ScanOutcome;
use crate::roster::Stats;

/// Events pushed to every connected operator page.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    Scan {
        outcome: ScanOutcome,
        message: String,
        stats: Stats,
    },
    Locked {
        remaining_secs: i64,
    },
    Unlocked,
    RosterLoaded {
        source: String,
        stats: Stats,
        duplicates: usize,
    },
    Reset {
        stats: Stats,
    },
    Camera {
        camera_id: Option<String>,
    },
    Error {
        kind: String,
        message: String,
    },
}

/// Fan-out of live events to websocket sessions.
#[derive(Clone, Default)]
pub struct LiveHub {
    senders: Arc<RwLock<Vec<mpsc::UnboundedSender<String>>>>,
}

impl LiveHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut senders = self.senders.write().unwrap_or_else(|e| e.into_inner());
        senders.push(tx);
        rx
    }

    pub fn publish(&self, event: &LiveEvent) {
        let msg = match serde_json::to_string(event) {
            Ok(m) => m,
            Err(e) => {
                log::error!("Failed to serialize live event: {e}");
                return;
            }
        };
        let senders = self.senders.read().unwrap_or_else(|e| e.into_inner());
        for sender in senders.iter() {
            let _ = sender.send(msg.clone());
        }
    }

    /// Drop senders whose websocket has gone away.
    pub fn prune(&self) {
        let mut senders = self.senders.write().unwrap_or_else(|e| e.into_inner());
        senders.retain(|s| !s.is_closed());
    }

    pub fn subscriber_count(&self) -> usize {
        self.senders.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_reaches_subscribers_and_prunes() {
        let hub = LiveHub::new();
        let mut rx = hub.subscribe();
        let dropped = hub.subscribe();
        drop(dropped);

        hub.publish(&LiveEvent::Locked { remaining_secs: 12 });
        let msg = rx.try_recv().unwrap();
        assert!(msg.contains("\"type\":\"locked\""));
        assert!(msg.contains("\"remaining_secs\":12"));

        hub.prune();
        assert_eq!(hub.subscriber_count(), 1);
    }
}
