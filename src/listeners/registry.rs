//! Active-listener registry
//!
//! Best-effort view of who is connected to the live feed right now. Entries
//! are keyed by a per-registration listener ID; a secondary index maps each
//! authenticated user to their single entry so reconnects collapse into one.
//!
//! Stale entries are evicted lazily: every operation first sweeps out entries
//! idle for longer than the inactivity timeout, so no background task is
//! needed.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use super::types::{ListenerId, ListenerSnapshot, ListenerStats, UserId};

/// Listeners idle for longer than this are evicted
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct ListenerEntry {
    user_id: Option<UserId>,
    username: String,
    avatar_url: Option<String>,
    is_guest: bool,
    is_playing: bool,
    last_activity: Instant,
    /// Registration order, used for stable listing
    seq: u64,
}

impl ListenerEntry {
    fn snapshot(&self, id: &str) -> ListenerSnapshot {
        ListenerSnapshot {
            id: id.to_string(),
            user_id: self.user_id,
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
            is_guest: self.is_guest,
            is_playing: self.is_playing,
        }
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    listeners: HashMap<ListenerId, ListenerEntry>,
    by_user: HashMap<UserId, ListenerId>,
    next_seq: u64,
}

impl RegistryInner {
    fn remove(&mut self, id: &str) -> Option<ListenerEntry> {
        let entry = self.listeners.remove(id)?;
        if let Some(user_id) = entry.user_id {
            // Only drop the mapping if it still points at this entry
            if self.by_user.get(&user_id).map(String::as_str) == Some(id) {
                self.by_user.remove(&user_id);
            }
        }
        Some(entry)
    }

    fn sweep(&mut self, now: Instant, timeout: Duration) {
        let stale: Vec<ListenerId> = self
            .listeners
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_activity) > timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            self.remove(id);
        }
        if !stale.is_empty() {
            debug!(
                "Evicted {} inactive listener(s) (remaining: {})",
                stale.len(),
                self.listeners.len()
            );
        }
    }
}

/// Registry of listeners currently connected to the live feed
///
/// All operations run to completion under a single mutex and never fail:
/// unknown or already-expired listener IDs are silently ignored.
pub struct ListenerRegistry {
    inner: Mutex<RegistryInner>,
    inactivity_timeout: Duration,
}

impl ListenerRegistry {
    /// Create a registry with the default 5 minute inactivity timeout
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_INACTIVITY_TIMEOUT)
    }

    pub fn with_timeout(inactivity_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            inactivity_timeout,
        }
    }

    pub fn inactivity_timeout(&self) -> Duration {
        self.inactivity_timeout
    }

    /// Register a listener and return its listener ID
    ///
    /// A non-guest whose user ID already has a live entry refreshes that entry
    /// and gets the existing listener ID back. Guests always get a new entry.
    pub fn register(
        &self,
        user_id: Option<UserId>,
        username: &str,
        avatar_url: Option<&str>,
        is_guest: bool,
    ) -> ListenerId {
        self.register_at(user_id, username, avatar_url, is_guest, Instant::now())
    }

    pub(crate) fn register_at(
        &self,
        user_id: Option<UserId>,
        username: &str,
        avatar_url: Option<&str>,
        is_guest: bool,
        now: Instant,
    ) -> ListenerId {
        let mut inner = self.inner.lock();
        inner.sweep(now, self.inactivity_timeout);

        let dedup_user = if is_guest { None } else { user_id };

        if let Some(user_id) = dedup_user {
            if let Some(existing_id) = inner.by_user.get(&user_id).cloned() {
                if let Some(entry) = inner.listeners.get_mut(&existing_id) {
                    entry.username = username.to_string();
                    entry.avatar_url = avatar_url.map(str::to_string);
                    entry.last_activity = now;
                    debug!(
                        "Listener {} refreshed for user {} (reconnect)",
                        existing_id, user_id
                    );
                    return existing_id;
                }
                // Dangling mapping, fall through and replace it
                inner.by_user.remove(&user_id);
            }
        }

        let id = Uuid::new_v4().to_string();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.listeners.insert(
            id.clone(),
            ListenerEntry {
                user_id,
                username: username.to_string(),
                avatar_url: avatar_url.map(str::to_string),
                is_guest,
                is_playing: false,
                last_activity: now,
                seq,
            },
        );
        if let Some(user_id) = dedup_user {
            inner.by_user.insert(user_id, id.clone());
        }

        info!(
            "Listener {} registered ({}, total: {})",
            id,
            if is_guest { "guest" } else { username },
            inner.listeners.len()
        );
        id
    }

    /// Remove a listener. Unknown IDs are ignored.
    pub fn unregister(&self, id: &str) {
        let mut inner = self.inner.lock();
        if inner.remove(id).is_some() {
            info!(
                "Listener {} unregistered (total: {})",
                id,
                inner.listeners.len()
            );
        }
        inner.sweep(Instant::now(), self.inactivity_timeout);
    }

    /// Mark a listener as active now. Unknown or expired IDs are ignored.
    pub fn touch(&self, id: &str) {
        self.touch_at(id, Instant::now());
    }

    pub(crate) fn touch_at(&self, id: &str, now: Instant) {
        let mut inner = self.inner.lock();
        inner.sweep(now, self.inactivity_timeout);
        if let Some(entry) = inner.listeners.get_mut(id) {
            entry.last_activity = now;
        }
    }

    /// Update the player state reported by a listener. Unknown IDs are ignored.
    pub fn set_playing(&self, id: &str, is_playing: bool) {
        self.set_playing_at(id, is_playing, Instant::now());
    }

    pub(crate) fn set_playing_at(&self, id: &str, is_playing: bool, now: Instant) {
        let mut inner = self.inner.lock();
        inner.sweep(now, self.inactivity_timeout);
        if let Some(entry) = inner.listeners.get_mut(id) {
            if entry.is_playing != is_playing {
                debug!("Listener {} is_playing={}", id, is_playing);
            }
            entry.is_playing = is_playing;
            entry.last_activity = now;
        }
    }

    /// Snapshot of all live listeners in registration order
    pub fn list_active(&self) -> Vec<ListenerSnapshot> {
        self.list_active_at(Instant::now())
    }

    pub(crate) fn list_active_at(&self, now: Instant) -> Vec<ListenerSnapshot> {
        let mut inner = self.inner.lock();
        inner.sweep(now, self.inactivity_timeout);

        let mut entries: Vec<(&ListenerId, &ListenerEntry)> = inner.listeners.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.seq);
        entries
            .into_iter()
            .map(|(id, entry)| entry.snapshot(id))
            .collect()
    }

    /// Listener breakdown for the admin dashboard
    pub fn stats(&self) -> ListenerStats {
        ListenerStats::from_snapshots(&self.list_active())
    }

    /// User IDs of authenticated listeners whose player is playing
    ///
    /// Hook for the listening-rewards (XP) job of the main backend, which only
    /// credits users that are actually playing. Guests are never included.
    pub fn playing_users(&self) -> Vec<UserId> {
        self.list_active()
            .into_iter()
            .filter(|l| l.is_authenticated() && l.is_playing)
            .filter_map(|l| l.user_id)
            .collect()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAST_TIMEOUT: Duration = Duration::from_secs(5 * 60 + 1);

    #[test]
    fn test_same_user_deduplicated() {
        let registry = ListenerRegistry::new();
        let first = registry.register(Some(42), "user42", None, false);
        let second = registry.register(Some(42), "user42", None, false);

        assert_eq!(first, second);
        let active = registry.list_active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].user_id, Some(42));
    }

    #[test]
    fn test_reconnect_refreshes_identity() {
        let registry = ListenerRegistry::new();
        let id1 = registry.register(Some(7), "Alice", None, false);
        let id2 = registry.register(Some(7), "Alice2", Some("https://cdn/a.png"), false);

        assert_eq!(id1, id2);
        let active = registry.list_active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].username, "Alice2");
        assert_eq!(active[0].avatar_url.as_deref(), Some("https://cdn/a.png"));
    }

    #[test]
    fn test_reconnect_keeps_playing_state() {
        let registry = ListenerRegistry::new();
        let id = registry.register(Some(7), "Alice", None, false);
        registry.set_playing(&id, true);
        registry.register(Some(7), "Alice", None, false);

        assert!(registry.list_active()[0].is_playing);
    }

    #[test]
    fn test_guests_never_deduplicated() {
        let registry = ListenerRegistry::new();
        let a = registry.register(None, "Gość", None, true);
        let b = registry.register(None, "Gość", None, true);

        assert_ne!(a, b);
        assert_eq!(registry.list_active().len(), 2);
    }

    #[test]
    fn test_guest_with_user_id_not_indexed() {
        let registry = ListenerRegistry::new();
        let a = registry.register(Some(5), "guest", None, true);
        let b = registry.register(Some(5), "guest", None, true);
        assert_ne!(a, b);

        // A later authenticated registration is not folded into a guest entry
        let user = registry.register(Some(5), "user5", None, false);
        assert_ne!(user, a);
        assert_ne!(user, b);
        assert_eq!(registry.list_active().len(), 3);
    }

    #[test]
    fn test_list_in_registration_order() {
        let registry = ListenerRegistry::new();
        let ids: Vec<_> = (0..5)
            .map(|i| registry.register(Some(i), &format!("user{}", i), None, false))
            .collect();

        let listed: Vec<_> = registry.list_active().into_iter().map(|l| l.id).collect();
        assert_eq!(listed, ids);
    }

    #[test]
    fn test_inactive_listener_swept_with_index() {
        let registry = ListenerRegistry::new();
        let start = Instant::now();
        let old_id = registry.register_at(Some(42), "user42", None, false, start);
        let guest = registry.register_at(None, "Gość", None, true, start);

        let later = start + PAST_TIMEOUT;
        assert!(registry.list_active_at(later).is_empty());

        let new_id = registry.register_at(Some(42), "user42", None, false, later);
        assert_ne!(new_id, old_id);
        assert_ne!(new_id, guest);
        assert_eq!(registry.list_active_at(later).len(), 1);
    }

    #[test]
    fn test_expired_user_not_revived_by_register() {
        let registry = ListenerRegistry::new();
        let start = Instant::now();
        let old_id = registry.register_at(Some(1), "user1", None, false, start);

        // No list call in between: register itself must not reuse the stale entry
        let new_id = registry.register_at(Some(1), "user1", None, false, start + PAST_TIMEOUT);
        assert_ne!(new_id, old_id);
    }

    #[test]
    fn test_touch_keeps_listener_alive() {
        let registry = ListenerRegistry::new();
        let start = Instant::now();
        let id = registry.register_at(Some(1), "user1", None, false, start);

        let mid = start + Duration::from_secs(4 * 60);
        registry.touch_at(&id, mid);

        let later = start + PAST_TIMEOUT;
        let active = registry.list_active_at(later);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, id);
    }

    #[test]
    fn test_touch_after_expiry_is_noop() {
        let registry = ListenerRegistry::new();
        let start = Instant::now();
        let id = registry.register_at(Some(1), "user1", None, false, start);

        let later = start + PAST_TIMEOUT;
        registry.touch_at(&id, later);
        assert!(registry.list_active_at(later).is_empty());
    }

    #[test]
    fn test_set_playing_refreshes_activity() {
        let registry = ListenerRegistry::new();
        let start = Instant::now();
        let id = registry.register_at(None, "Gość", None, true, start);

        let mid = start + Duration::from_secs(4 * 60);
        registry.set_playing_at(&id, true, mid);

        let active = registry.list_active_at(start + PAST_TIMEOUT);
        assert_eq!(active.len(), 1);
        assert!(active[0].is_playing);
    }

    #[test]
    fn test_unknown_ids_ignored() {
        let registry = ListenerRegistry::new();
        let id = registry.register(Some(1), "user1", None, false);
        registry.set_playing(&id, true);

        registry.touch("missing");
        registry.unregister("missing");
        registry.set_playing("missing", false);

        let active = registry.list_active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, id);
        assert!(active[0].is_playing);
    }

    #[test]
    fn test_unregister_clears_user_index() {
        let registry = ListenerRegistry::new();
        let id = registry.register(Some(9), "user9", None, false);
        registry.unregister(&id);
        registry.unregister(&id);

        assert!(registry.list_active().is_empty());
        let new_id = registry.register(Some(9), "user9", None, false);
        assert_ne!(new_id, id);
    }

    #[test]
    fn test_custom_timeout() {
        let registry = ListenerRegistry::with_timeout(Duration::from_secs(10));
        let start = Instant::now();
        registry.register_at(None, "Gość", None, true, start);

        assert_eq!(registry.list_active_at(start + Duration::from_secs(10)).len(), 1);
        assert!(registry
            .list_active_at(start + Duration::from_secs(11))
            .is_empty());
    }

    #[test]
    fn test_stats_and_playing_users() {
        let registry = ListenerRegistry::new();
        let alice = registry.register(Some(1), "Alice", None, false);
        registry.register(Some(2), "Bob", None, false);
        let guest = registry.register(None, "Gość", None, true);
        registry.set_playing(&alice, true);
        registry.set_playing(&guest, true);

        let stats = registry.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.playing, 2);
        assert_eq!(stats.users.active, 2);
        assert_eq!(stats.users.playing, 1);
        assert_eq!(stats.guests.active, 1);
        assert_eq!(stats.guests.playing, 1);

        assert_eq!(registry.playing_users(), vec![1]);
    }
}
