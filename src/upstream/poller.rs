use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::types::{RecentSongs, RefreshKind};
use super::NowPlayingSource;
use crate::error::Result;
use crate::events::types::{NEXT_SONG, NOW_PLAYING, RECENT_SONGS};
use crate::events::BroadcastHub;
use crate::utils::LogThrottler;
use crate::warn_throttled;

const POLL_ERROR_KEY: &str = "now_playing_poll";

/// Publish `value`, or `{}` when the upstream had nothing
fn publish_or_empty<T: Serialize>(hub: &BroadcastHub, event_type: &str, value: Option<&T>) {
    match value {
        Some(value) => hub.publish(event_type, value),
        None => hub.publish(event_type, &serde_json::json!({})),
    };
}

/// Fetch and publish the feeds selected by `kind`
///
/// Used by the refresh webhook; unlike the poller it publishes regardless of
/// whether the track changed.
pub async fn publish_snapshot(
    source: &dyn NowPlayingSource,
    hub: &BroadcastHub,
    kind: RefreshKind,
    recent_limit: usize,
) -> Result<()> {
    if matches!(kind, RefreshKind::SongChange | RefreshKind::NowPlaying) {
        let now_playing = source.now_playing().await?;
        publish_or_empty(hub, NOW_PLAYING, now_playing.as_ref());
    }
    if matches!(kind, RefreshKind::SongChange | RefreshKind::RecentSongs) {
        let songs = source.recent_songs(recent_limit).await?.unwrap_or_default();
        hub.publish(RECENT_SONGS, &RecentSongs { songs });
    }
    if matches!(kind, RefreshKind::SongChange | RefreshKind::NextSong) {
        let next = source.next_song().await?;
        publish_or_empty(hub, NEXT_SONG, next.as_ref());
    }
    Ok(())
}

/// Polls the upstream and publishes on track change
pub struct NowPlayingPoller {
    source: Arc<dyn NowPlayingSource>,
    hub: Arc<BroadcastHub>,
    interval: Duration,
    recent_limit: usize,
    last_song_id: Option<String>,
    throttler: LogThrottler,
}

impl NowPlayingPoller {
    pub fn new(
        source: Arc<dyn NowPlayingSource>,
        hub: Arc<BroadcastHub>,
        interval: Duration,
        recent_limit: usize,
    ) -> Self {
        Self {
            source,
            hub,
            interval,
            recent_limit,
            last_song_id: None,
            throttler: LogThrottler::with_secs(60),
        }
    }

    /// Poll once. Returns `true` if a track change was published.
    ///
    /// The last seen song ID is only updated after all three feeds were
    /// fetched, so a partial failure is retried on the next tick.
    pub async fn poll_once(&mut self) -> Result<bool> {
        let Some(now_playing) = self.source.now_playing().await? else {
            return Ok(false);
        };

        if self.last_song_id.as_deref() == Some(now_playing.song_id.as_str()) {
            return Ok(false);
        }

        let songs = self
            .source
            .recent_songs(self.recent_limit)
            .await?
            .unwrap_or_default();
        let next = self.source.next_song().await?;

        info!(
            "Now playing: {} - {} (song {})",
            now_playing.artist, now_playing.title, now_playing.song_id
        );

        self.hub.publish(NOW_PLAYING, &now_playing);
        self.hub.publish(RECENT_SONGS, &RecentSongs { songs });
        publish_or_empty(&self.hub, NEXT_SONG, next.as_ref());

        self.last_song_id = Some(now_playing.song_id);
        Ok(true)
    }

    /// Poll until a shutdown signal arrives
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Now-playing poller stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(changed) => {
                            if self.throttler.clear(POLL_ERROR_KEY) {
                                info!("Upstream now-playing feed recovered");
                            }
                            if !changed {
                                debug!("Now playing unchanged");
                            }
                        }
                        Err(e) => {
                            warn_throttled!(
                                self.throttler,
                                POLL_ERROR_KEY,
                                "Now-playing poll failed: {}",
                                e
                            );
                        }
                    }
                }
            }
        }
    }

    /// Run the poller on a background task
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        info!(
            "Now-playing poller started (interval: {}ms)",
            self.interval.as_millis()
        );
        tokio::spawn(self.run(shutdown))
    }
}
