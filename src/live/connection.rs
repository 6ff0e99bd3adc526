//! Per-client live connection
//!
//! A [`LiveConnection`] owns both resources a push client holds: a hub
//! subscription and a listener registration. Both are released in `Drop`, so
//! cleanup happens on every exit path: normal end of stream, client
//! disconnect (hyper drops the body) or cancellation of the response task.

use futures::Stream;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::events::types::ACTIVE_LISTENERS;
use crate::events::{connected_frame, BroadcastHub, Subscription, KEEPALIVE_FRAME};
use crate::listeners::{ActiveListeners, ListenerId, ListenerRegistry, UserId};

/// Interval of silence after which a keepalive frame is sent
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Display name used for listeners without a session
pub const GUEST_NAME: &str = "Gość";

/// Who is opening the live connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerIdentity {
    pub user_id: Option<UserId>,
    pub username: String,
    pub avatar_url: Option<String>,
    pub is_guest: bool,
}

impl ListenerIdentity {
    pub fn guest() -> Self {
        Self {
            user_id: None,
            username: GUEST_NAME.to_string(),
            avatar_url: None,
            is_guest: true,
        }
    }

    pub fn user(user_id: UserId, username: impl Into<String>, avatar_url: Option<String>) -> Self {
        Self {
            user_id: Some(user_id),
            username: username.into(),
            avatar_url,
            is_guest: false,
        }
    }
}

/// RAII guard for one live push connection
pub struct LiveConnection {
    hub: Arc<BroadcastHub>,
    listeners: Arc<ListenerRegistry>,
    listener_id: ListenerId,
    subscription: Subscription,
}

impl LiveConnection {
    /// Register the listener, subscribe to the hub and announce the new listener list
    pub fn open(
        hub: Arc<BroadcastHub>,
        listeners: Arc<ListenerRegistry>,
        identity: &ListenerIdentity,
    ) -> Self {
        let listener_id = listeners.register(
            identity.user_id,
            &identity.username,
            identity.avatar_url.as_deref(),
            identity.is_guest,
        );
        let subscription = hub.subscribe();

        info!(
            "Live connection opened: listener {} (subscriber {})",
            listener_id,
            subscription.id()
        );

        let conn = Self {
            hub,
            listeners,
            listener_id,
            subscription,
        };
        conn.announce_listeners();
        conn
    }

    pub fn listener_id(&self) -> &str {
        &self.listener_id
    }

    /// Publish the current listener list to every subscriber
    fn announce_listeners(&self) {
        let payload = ActiveListeners {
            listeners: self.listeners.list_active(),
        };
        self.hub.publish(ACTIVE_LISTENERS, &payload);
    }

    /// Turn the connection into a stream of SSE frames
    ///
    /// The first frame is the `connected` event. After that every queued hub
    /// frame is forwarded as-is; when nothing arrives within `keepalive` a
    /// keepalive comment is sent instead. Each delivered frame refreshes the
    /// listener's activity. The stream ends only if the hub drops this
    /// subscriber; the connection guard is released when the stream is dropped.
    pub fn into_stream(
        self,
        keepalive: Duration,
    ) -> impl Stream<Item = Result<String, std::io::Error>> + Send + 'static {
        async_stream::stream! {
            let mut conn = self;
            yield Ok(connected_frame(&conn.listener_id));

            loop {
                match tokio::time::timeout(keepalive, conn.subscription.recv()).await {
                    Ok(Some(frame)) => {
                        yield Ok(frame.to_string());
                        conn.listeners.touch(&conn.listener_id);
                    }
                    Ok(None) => {
                        debug!("Subscriber {} closed by hub", conn.subscription.id());
                        break;
                    }
                    Err(_) => {
                        yield Ok(KEEPALIVE_FRAME.to_string());
                        conn.listeners.touch(&conn.listener_id);
                    }
                }
            }
        }
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.subscription.id());
        self.listeners.unregister(&self.listener_id);
        info!("Live connection closed: listener {}", self.listener_id);
        self.announce_listeners();
    }
}
