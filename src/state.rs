use std::sync::Arc;
use tokio::sync::broadcast;

use crate::auth::SessionStore;
use crate::config::ConfigStore;
use crate::events::BroadcastHub;
use crate::listeners::ListenerRegistry;
use crate::upstream::NowPlayingSource;

/// Application-wide state shared across handlers
///
/// # Live feed
///
/// - `hub` fans events out to every connected listener
/// - `listeners` tracks who is connected and who is playing
/// - `upstream` answers on-demand now-playing queries; the background
///   poller holds its own handle to the same source
pub struct AppState {
    /// Configuration store
    pub config: ConfigStore,
    /// Session store
    pub sessions: SessionStore,
    /// Broadcast hub for live events
    pub hub: Arc<BroadcastHub>,
    /// Active listener registry
    pub listeners: Arc<ListenerRegistry>,
    /// Radio engine client
    pub upstream: Arc<dyn NowPlayingSource>,
    /// Shutdown signal sender
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ConfigStore,
        sessions: SessionStore,
        hub: Arc<BroadcastHub>,
        listeners: Arc<ListenerRegistry>,
        upstream: Arc<dyn NowPlayingSource>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            sessions,
            hub,
            listeners,
            upstream,
            shutdown_tx,
        })
    }

    /// Subscribe to shutdown signal
    pub fn shutdown_signal(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }
}
