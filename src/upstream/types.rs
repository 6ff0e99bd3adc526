use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Currently playing track (payload of `now_playing`)
#[typeshare]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub title: String,
    pub artist: String,
    /// Album art URL
    pub thumbnail: Option<String>,
    /// Upstream song identifier, used to detect track changes
    #[serde(rename = "songId")]
    pub song_id: String,
    /// Public stream URL
    #[serde(rename = "streamUrl")]
    pub stream_url: String,
}

/// One entry of the play history
#[typeshare]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentSong {
    pub title: String,
    pub artist: String,
    pub thumbnail: Option<String>,
    /// Unix timestamp (seconds)
    pub played_at: Option<i64>,
}

/// Payload of `recent_songs`
#[typeshare]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentSongs {
    pub songs: Vec<RecentSong>,
}

/// Next queued track (payload of `next_song`)
#[typeshare]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextSong {
    pub title: String,
    pub artist: String,
    pub thumbnail: Option<String>,
}

/// What a refresh request should re-publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// Track changed: all three feeds
    SongChange,
    NowPlaying,
    RecentSongs,
    NextSong,
}

impl RefreshKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "song_change" => Some(Self::SongChange),
            "now_playing" => Some(Self::NowPlaying),
            "recent_songs" => Some(Self::RecentSongs),
            "next_song" => Some(Self::NextSong),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_playing_wire_names() {
        let np = NowPlaying {
            title: "Song".to_string(),
            artist: "Band".to_string(),
            thumbnail: None,
            song_id: "abc".to_string(),
            stream_url: "https://radio/listen".to_string(),
        };
        let value = serde_json::to_value(&np).unwrap();
        assert_eq!(value["songId"], "abc");
        assert_eq!(value["streamUrl"], "https://radio/listen");
        assert!(value["thumbnail"].is_null());
    }

    #[test]
    fn test_refresh_kind_parse() {
        assert_eq!(RefreshKind::parse("song_change"), Some(RefreshKind::SongChange));
        assert_eq!(RefreshKind::parse("next_song"), Some(RefreshKind::NextSong));
        assert_eq!(RefreshKind::parse("bogus"), None);
    }
}
