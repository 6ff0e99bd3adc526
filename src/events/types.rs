//! Live event type tags
//!
//! Every frame carries one of these in its `type` field.

/// Current track changed (payload: `NowPlaying`)
pub const NOW_PLAYING: &str = "now_playing";

/// Play history refreshed (payload: `{"songs": [...]}`)
pub const RECENT_SONGS: &str = "recent_songs";

/// Queued track changed (payload: `NextSong` or `{}`)
pub const NEXT_SONG: &str = "next_song";

/// Listener joined or left (payload: `{"listeners": [...]}`)
pub const ACTIVE_LISTENERS: &str = "active_listeners";

/// Synthetic first frame of a connection, never published through the hub
pub const CONNECTED: &str = "connected";
