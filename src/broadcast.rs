use std::collections::HashSet;

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::{debug, error};
use uuid::Uuid;

use crate::matcher::MatchEvent;

/// An event pushed to live subscribers, serialized as `{"type", "data"}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
    /// Full keyword snapshot after a keyword mutation
    Keywords(Vec<String>),
    /// Full chat snapshot after a registry mutation
    Chats(Vec<i64>),
    /// A keyword hit
    NewMatch(MatchEvent),
}

impl Event {
    pub fn keywords(snapshot: HashSet<String>) -> Self {
        Event::Keywords(snapshot.into_iter().collect())
    }

    pub fn chats(snapshot: HashSet<i64>) -> Self {
        Event::Chats(snapshot.into_iter().collect())
    }
}

struct Subscriber {
    id: Uuid,
    tx: UnboundedSender<String>,
}

/// Fan-out of events to every connected live subscriber.
///
/// Each subscriber is an unbounded channel feeding one WebSocket task.
/// Delivery is best-effort and at-most-once per subscriber per event: a
/// subscriber whose channel is closed is pruned after the delivery pass
/// completes, without affecting deliveries to the others in the same pass.
/// The registry lock is held for the whole pass, so events reach any single
/// subscriber in broadcast order. Late joiners see only future events.
pub struct Broadcaster {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a new subscriber and hand back its id and event stream.
    pub async fn register(&self) -> (Uuid, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.subscribers.lock().await.push(Subscriber { id, tx });
        (id, rx)
    }

    /// Drop a subscriber. Unknown ids are ignored (the subscriber may
    /// already have been pruned by a failed delivery).
    pub async fn unregister(&self, id: Uuid) {
        self.subscribers.lock().await.retain(|sub| sub.id != id);
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// Deliver one event to every subscriber. Never fails as a whole; a
    /// zero-subscriber broadcast is a successful no-op.
    pub async fn broadcast(&self, event: &Event) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize event for broadcast: {e}");
                return;
            }
        };

        let mut subscribers = self.subscribers.lock().await;
        let mut dead = Vec::new();
        for sub in subscribers.iter() {
            if sub.tx.send(payload.clone()).is_err() {
                dead.push(sub.id);
            }
        }
        if !dead.is_empty() {
            subscribers.retain(|sub| !dead.contains(&sub.id));
            debug!("Pruned {} dead subscriber(s) after broadcast", dead.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_with_zero_subscribers_is_ok() {
        let broadcaster = Broadcaster::new();
        broadcaster
            .broadcast(&Event::Keywords(vec!["job".to_string()]))
            .await;
        assert_eq!(broadcaster.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_the_event() {
        let broadcaster = Broadcaster::new();
        let (_id1, mut rx1) = broadcaster.register().await;
        let (_id2, mut rx2) = broadcaster.register().await;

        broadcaster.broadcast(&Event::Chats(vec![42])).await;

        let p1 = rx1.recv().await.unwrap();
        let p2 = rx2.recv().await.unwrap();
        assert_eq!(p1, p2);
        let value: serde_json::Value = serde_json::from_str(&p1).unwrap();
        assert_eq!(value["type"], "chats");
        assert_eq!(value["data"], serde_json::json!([42]));
    }

    #[tokio::test]
    async fn test_dead_subscriber_is_pruned_after_the_pass() {
        let broadcaster = Broadcaster::new();
        let (_id1, rx1) = broadcaster.register().await;
        let (_id2, mut rx2) = broadcaster.register().await;

        // Simulate a mid-broadcast disconnect: the first receiver is gone
        // before the event goes out.
        drop(rx1);
        broadcaster
            .broadcast(&Event::Keywords(vec!["job".to_string()]))
            .await;

        // The healthy subscriber still gets the event, and the dead one is
        // absent from the registry after the pass.
        assert!(rx2.recv().await.is_some());
        assert_eq!(broadcaster.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn test_unregister_removes_subscriber() {
        let broadcaster = Broadcaster::new();
        let (id, _rx) = broadcaster.register().await;
        assert_eq!(broadcaster.subscriber_count().await, 1);
        broadcaster.unregister(id).await;
        assert_eq!(broadcaster.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_single_subscriber_sees_events_in_broadcast_order() {
        let broadcaster = Broadcaster::new();
        let (_id, mut rx) = broadcaster.register().await;

        broadcaster.broadcast(&Event::Keywords(vec![])).await;
        broadcaster.broadcast(&Event::Chats(vec![])).await;

        let first: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        let second: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(first["type"], "keywords");
        assert_eq!(second["type"], "chats");
    }

    #[tokio::test]
    async fn test_new_match_wire_shape() {
        use crate::matcher::{ChatKind, IncomingMessage};

        let broadcaster = Broadcaster::new();
        let (_id, mut rx) = broadcaster.register().await;

        let msg = IncomingMessage {
            chat_id: -100200300,
            message_id: 5,
            author: "Bob".to_string(),
            chat_title: "Gigs".to_string(),
            chat_kind: ChatKind::Group,
            chat_username: Some("gigs".to_string()),
            text: Some("remote job".to_string()),
            caption: None,
        };
        let keywords = std::iter::once("job".to_string()).collect();
        let event = crate::matcher::find_match(&msg, &keywords).unwrap();
        broadcaster.broadcast(&Event::NewMatch(event)).await;

        let value: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(value["type"], "new_match");
        assert_eq!(value["data"]["keyword"], "job");
        assert_eq!(value["data"]["chatName"], "Gigs");
        assert_eq!(value["data"]["chatLink"], "https://t.me/gigs/5");
        assert_eq!(value["data"]["message"], "remote job");
    }
}
