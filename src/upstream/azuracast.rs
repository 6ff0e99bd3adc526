//! AzuraCast now-playing client
//!
//! All three feeds come from the same endpoint, `GET /api/nowplaying/{station}`,
//! which returns either the station object or a one-element array of it.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::types::{NextSong, NowPlaying, RecentSong};
use super::NowPlayingSource;
use crate::config::UpstreamConfig;
use crate::error::{AppError, Result};

const UNKNOWN: &str = "Unknown";

/// HTTP client for the AzuraCast public API
pub struct AzuraCastClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    station_id: String,
    fallback_stream_url: Option<String>,
    public_base_url: String,
}

impl AzuraCastClient {
    pub fn new(config: &UpstreamConfig, public_base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_url.trim().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            station_id: config.station_id.clone(),
            fallback_stream_url: config.stream_url.clone().filter(|u| !u.is_empty()),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    /// Fetch the station object, `None` when no upstream is configured
    async fn fetch_station(&self) -> Result<Option<Value>> {
        if !self.is_configured() {
            debug!("AzuraCast URL not configured");
            return Ok(None);
        }

        let url = format!("{}/api/nowplaying/{}", self.base_url, self.station_id);
        debug!("Fetching now playing from: {}", url);

        let mut request = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(ref key) = self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "HTTP {} from {}: {}",
                status, url, body
            )));
        }

        let data: Value = response.json().await?;
        Ok(Some(unwrap_station(data)))
    }
}

#[async_trait]
impl NowPlayingSource for AzuraCastClient {
    async fn now_playing(&self) -> Result<Option<NowPlaying>> {
        Ok(self.fetch_station().await?.map(|station| {
            parse_now_playing(
                &station,
                &self.base_url,
                self.fallback_stream_url.as_deref(),
                &self.public_base_url,
            )
        }))
    }

    async fn recent_songs(&self, limit: usize) -> Result<Option<Vec<RecentSong>>> {
        Ok(self
            .fetch_station()
            .await?
            .map(|station| parse_recent_songs(&station, limit)))
    }

    async fn next_song(&self) -> Result<Option<NextSong>> {
        Ok(self
            .fetch_station()
            .await?
            .and_then(|station| parse_next_song(&station)))
    }
}

/// The endpoint may wrap the station in an array
fn unwrap_station(data: Value) -> Value {
    match data {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    }
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Title and artist of a song object, falling back to splitting `text` ("Artist - Title")
fn title_and_artist(song: &Value) -> (String, String) {
    let mut title = non_empty_str(song, "title").map(str::to_string);
    let mut artist = non_empty_str(song, "artist").map(str::to_string);

    if title.is_none() && artist.is_none() {
        if let Some(text) = non_empty_str(song, "text") {
            match text.split_once(" - ") {
                Some((a, t)) => {
                    artist = Some(a.trim().to_string());
                    title = Some(t.trim().to_string());
                }
                None => title = Some(text.to_string()),
            }
        }
    }

    (
        title.unwrap_or_else(|| UNKNOWN.to_string()),
        artist.unwrap_or_else(|| UNKNOWN.to_string()),
    )
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Build the `now_playing` payload from a station object
pub(crate) fn parse_now_playing(
    station: &Value,
    base_url: &str,
    fallback_stream_url: Option<&str>,
    public_base_url: &str,
) -> NowPlaying {
    let now_playing = station.get("now_playing").unwrap_or(&Value::Null);
    let song = now_playing.get("song").unwrap_or(&Value::Null);
    let (title, artist) = title_and_artist(song);

    let song_id = song
        .get("id")
        .and_then(id_string)
        .or_else(|| now_playing.get("sh_id").and_then(id_string))
        .unwrap_or_default();

    NowPlaying {
        title,
        artist,
        thumbnail: non_empty_str(song, "art").map(str::to_string),
        song_id,
        stream_url: resolve_stream_url(station, base_url, fallback_stream_url, public_base_url),
    }
}

/// Stream URL lookup order: first mount, listeners URL, public player, configured
/// fallback, then our own stream proxy
fn resolve_stream_url(
    station: &Value,
    base_url: &str,
    fallback_stream_url: Option<&str>,
    public_base_url: &str,
) -> String {
    let mount = station
        .get("mounts")
        .and_then(Value::as_array)
        .and_then(|mounts| mounts.first());

    if let Some(mount) = mount {
        if let Some(url) = non_empty_str(mount, "url") {
            return url.to_string();
        }
        if let Some(path) = non_empty_str(mount, "path") {
            return format!("{}{}", base_url, path);
        }
    }

    if let Some(url) = station.get("listeners").and_then(|l| non_empty_str(l, "url")) {
        return url.to_string();
    }
    if let Some(url) = non_empty_str(station, "public_player_url") {
        return url.to_string();
    }
    if let Some(url) = fallback_stream_url {
        return url.to_string();
    }

    format!("{}/api/radio/stream", public_base_url)
}

/// Build the play history from a station object
pub(crate) fn parse_recent_songs(station: &Value, limit: usize) -> Vec<RecentSong> {
    let history = ["song_history", "recent_songs", "history"]
        .iter()
        .filter_map(|key| station.get(*key).and_then(Value::as_array))
        .find(|items| !items.is_empty());

    let Some(history) = history else {
        return Vec::new();
    };

    history
        .iter()
        .take(limit)
        .filter_map(|item| {
            let song = item
                .get("song")
                .filter(|s| s.as_object().is_some_and(|o| !o.is_empty()))?;
            let (title, artist) = title_and_artist(song);
            Some(RecentSong {
                title,
                artist,
                thumbnail: non_empty_str(song, "art").map(str::to_string),
                played_at: item.get("played_at").and_then(Value::as_i64),
            })
        })
        .collect()
}

/// Build the `next_song` payload, `None` when nothing is queued
pub(crate) fn parse_next_song(station: &Value) -> Option<NextSong> {
    let song = station
        .get("playing_next")
        .filter(|v| v.is_object())?
        .get("song")
        .filter(|v| v.as_object().is_some_and(|o| !o.is_empty()))?;

    let (title, artist) = title_and_artist(song);
    Some(NextSong {
        title,
        artist,
        thumbnail: non_empty_str(song, "art").map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "https://radio.example.com";
    const PUBLIC: &str = "https://app.example.com";

    fn station() -> Value {
        json!({
            "now_playing": {
                "sh_id": 991,
                "song": {"id": "f00d", "title": "Song", "artist": "Band", "art": "https://art/1.jpg"}
            },
            "playing_next": {
                "song": {"text": "Next Band - Next Song", "art": ""}
            },
            "song_history": [
                {"played_at": 1700000000, "song": {"title": "A", "artist": "X"}},
                {"played_at": 1699999000, "song": {"text": "Just A Title"}},
                {"played_at": 1699998000, "song": {}},
                {"played_at": 1699997000, "song": {"title": "C", "artist": "Z"}}
            ],
            "mounts": [{"url": "https://radio.example.com/listen/radio.mp3", "path": "/radio.mp3"}]
        })
    }

    #[test]
    fn test_unwrap_station_array() {
        let wrapped = json!([{"name": "first"}, {"name": "second"}]);
        assert_eq!(unwrap_station(wrapped)["name"], "first");
        assert_eq!(unwrap_station(json!({"name": "plain"}))["name"], "plain");
    }

    #[test]
    fn test_parse_now_playing() {
        let np = parse_now_playing(&station(), BASE, None, PUBLIC);
        assert_eq!(np.title, "Song");
        assert_eq!(np.artist, "Band");
        assert_eq!(np.thumbnail.as_deref(), Some("https://art/1.jpg"));
        assert_eq!(np.song_id, "f00d");
        assert_eq!(np.stream_url, "https://radio.example.com/listen/radio.mp3");
    }

    #[test]
    fn test_song_id_falls_back_to_sh_id() {
        let station = json!({"now_playing": {"sh_id": 991, "song": {"title": "T"}}});
        let np = parse_now_playing(&station, BASE, None, PUBLIC);
        assert_eq!(np.song_id, "991");
        assert_eq!(np.artist, UNKNOWN);
    }

    #[test]
    fn test_stream_url_fallbacks() {
        let from_path = json!({"mounts": [{"path": "/radio.mp3"}]});
        assert_eq!(
            resolve_stream_url(&from_path, BASE, None, PUBLIC),
            "https://radio.example.com/radio.mp3"
        );

        let from_listeners = json!({"mounts": [], "listeners": {"url": "https://l/stream"}});
        assert_eq!(
            resolve_stream_url(&from_listeners, BASE, None, PUBLIC),
            "https://l/stream"
        );

        let from_player = json!({"public_player_url": "https://player"});
        assert_eq!(
            resolve_stream_url(&from_player, BASE, Some("https://configured"), PUBLIC),
            "https://player"
        );

        let empty = json!({});
        assert_eq!(
            resolve_stream_url(&empty, BASE, Some("https://configured"), PUBLIC),
            "https://configured"
        );
        assert_eq!(
            resolve_stream_url(&empty, BASE, None, PUBLIC),
            "https://app.example.com/api/radio/stream"
        );
    }

    #[test]
    fn test_parse_recent_songs() {
        let songs = parse_recent_songs(&station(), 10);
        assert_eq!(songs.len(), 3);
        assert_eq!(songs[0].title, "A");
        assert_eq!(songs[0].played_at, Some(1700000000));
        assert_eq!(songs[1].title, "Just A Title");
        assert_eq!(songs[1].artist, UNKNOWN);
        assert_eq!(songs[2].title, "C");
    }

    #[test]
    fn test_recent_songs_limit_and_alt_keys() {
        assert_eq!(parse_recent_songs(&station(), 1).len(), 1);

        let alt = json!({"song_history": [], "history": [{"song": {"title": "H"}}]});
        let songs = parse_recent_songs(&alt, 10);
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "H");

        assert!(parse_recent_songs(&json!({}), 10).is_empty());
    }

    #[test]
    fn test_parse_next_song() {
        let next = parse_next_song(&station()).unwrap();
        assert_eq!(next.artist, "Next Band");
        assert_eq!(next.title, "Next Song");
        assert_eq!(next.thumbnail, None);

        assert!(parse_next_song(&json!({"playing_next": null})).is_none());
        assert!(parse_next_song(&json!({"playing_next": {"song": {}}})).is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_client_returns_none() {
        let client = AzuraCastClient::new(&UpstreamConfig::default(), PUBLIC).unwrap();
        assert!(client.now_playing().await.unwrap().is_none());
        assert!(client.recent_songs(10).await.unwrap().is_none());
        assert!(client.next_song().await.unwrap().is_none());
    }
}
