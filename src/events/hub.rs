//! Broadcast hub
//!
//! Fans each published event out to a private unbounded queue per subscriber.
//! A queue that can no longer be written to (its receiver was dropped) is
//! treated as an implicit unsubscribe.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::wire::encode_event;

/// Subscriber ID (unique per hub)
pub type SubscriberId = u64;

/// A pre-serialized frame shared by all subscribers of one publish
pub type Frame = Arc<str>;

/// Receiving half of a subscriber queue
///
/// Owned by the connection that subscribed. The hub only keeps the sender.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::UnboundedReceiver<Frame>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next frame
    ///
    /// Returns `None` once the hub has dropped this subscriber.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Take the next frame if one is already queued
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }
}

/// Process-wide publish/subscribe hub
///
/// # Example
///
/// ```no_run
/// use radio_live::events::BroadcastHub;
///
/// # async fn demo() {
/// let hub = BroadcastHub::new();
/// let mut sub = hub.subscribe();
///
/// hub.publish("now_playing", &serde_json::json!({"title": "X"}));
///
/// let frame = sub.recv().await.unwrap();
/// assert!(frame.starts_with("data: "));
/// hub.unsubscribe(sub.id());
/// # }
/// ```
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::UnboundedSender<Frame>>>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new delivery queue and add it to the membership set
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let total = {
            let mut subscribers = self.subscribers.lock();
            subscribers.insert(id, tx);
            subscribers.len()
        };
        info!("Live subscriber {} connected (total: {})", id, total);

        Subscription { id, rx }
    }

    /// Remove a subscriber. Removing an absent subscriber is a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut subscribers = self.subscribers.lock();
        if subscribers.remove(&id).is_some() {
            info!(
                "Live subscriber {} disconnected (total: {})",
                id,
                subscribers.len()
            );
        }
    }

    /// Publish an event to every current subscriber
    ///
    /// The envelope is serialized once and only when someone is listening.
    /// Returns the number of queues the frame was written to. Subscribers whose
    /// queue is closed are removed after the fan-out pass.
    pub fn publish<T>(&self, event_type: &str, payload: &T) -> usize
    where
        T: ?Sized + Serialize,
    {
        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return 0;
        }

        let frame: Frame = match encode_event(event_type, payload) {
            Ok(frame) => frame.into(),
            Err(e) => {
                warn!("Failed to serialize '{}' event, not publishing: {}", event_type, e);
                return 0;
            }
        };

        let mut dead = Vec::new();
        let mut delivered = 0;
        for (id, tx) in subscribers.iter() {
            if tx.send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }

        for id in &dead {
            subscribers.remove(id);
        }
        if !dead.is_empty() {
            warn!(
                "Dropped {} dead live subscriber(s) while publishing '{}' (total: {})",
                dead.len(),
                event_type,
                subscribers.len()
            );
        }

        debug!("Published '{}' to {} subscriber(s)", event_type, delivered);
        delivered
    }

    /// Current number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
