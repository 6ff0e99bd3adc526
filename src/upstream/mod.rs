//! Upstream radio engine
//!
//! The live feed is driven by the radio engine's now-playing state. A
//! [`NowPlayingPoller`] polls a [`NowPlayingSource`] on a fixed interval and
//! publishes `now_playing`, `recent_songs` and `next_song` whenever the
//! current track changes.

mod azuracast;
mod poller;
mod types;

use async_trait::async_trait;

pub use azuracast::AzuraCastClient;
pub use poller::{publish_snapshot, NowPlayingPoller};
pub use types::{NextSong, NowPlaying, RecentSong, RecentSongs, RefreshKind};

use crate::error::Result;

/// Source of the current playback state
///
/// Every method returns `Ok(None)` when the upstream is unavailable or
/// unconfigured, and `Err` on transport/protocol failures.
#[async_trait]
pub trait NowPlayingSource: Send + Sync {
    /// Currently playing track
    async fn now_playing(&self) -> Result<Option<NowPlaying>>;

    /// Most recent `limit` tracks, newest first
    async fn recent_songs(&self, limit: usize) -> Result<Option<Vec<RecentSong>>>;

    /// Next queued track
    async fn next_song(&self) -> Result<Option<NextSong>>;
}
