use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Listener ID type (UUID string)
pub type ListenerId = String;

/// Authenticated user ID
pub type UserId = i64;

/// Point-in-time view of one active listener
#[typeshare]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerSnapshot {
    /// Listener ID assigned at registration
    pub id: ListenerId,
    /// Authenticated user, None for guests
    pub user_id: Option<UserId>,
    /// Display name
    pub username: String,
    /// Avatar URL
    pub avatar_url: Option<String>,
    pub is_guest: bool,
    /// Whether the client reports its player as playing
    pub is_playing: bool,
}

impl ListenerSnapshot {
    /// Signed-in listener with a stable user ID
    pub fn is_authenticated(&self) -> bool {
        !self.is_guest && self.user_id.is_some()
    }
}

/// Payload of the `active_listeners` event and the listing endpoint
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveListeners {
    pub listeners: Vec<ListenerSnapshot>,
}

/// Active/playing counters for one group of listeners
#[typeshare]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerCounts {
    pub active: usize,
    pub playing: usize,
}

/// Admin dashboard breakdown of current listeners
#[typeshare]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerStats {
    /// All registered listeners
    pub total: usize,
    /// Listeners with a playing player
    pub playing: usize,
    /// Authenticated listeners
    pub users: ListenerCounts,
    /// Guest listeners
    pub guests: ListenerCounts,
}

impl ListenerStats {
    pub fn from_snapshots(listeners: &[ListenerSnapshot]) -> Self {
        let mut stats = Self::default();
        for listener in listeners {
            stats.total += 1;
            if listener.is_playing {
                stats.playing += 1;
            }

            let group = if listener.is_guest {
                &mut stats.guests
            } else if listener.user_id.is_some() {
                &mut stats.users
            } else {
                continue;
            };
            group.active += 1;
            if listener.is_playing {
                group.playing += 1;
            }
        }
        stats
    }
}
