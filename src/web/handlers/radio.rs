use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::StatusResponse;
use crate::auth::current_user;
use crate::error::Result;
use crate::listeners::{ActiveListeners, ListenerId};
use crate::live::{ListenerIdentity, LiveConnection};
use crate::state::AppState;
use crate::upstream::{publish_snapshot, NowPlaying, RefreshKind};

// ============================================================================
// Live feed
// ============================================================================

/// Server-push stream of radio events
///
/// Signed-in users are registered under their profile, everyone else as a
/// guest. The listener ID is announced in the first `connected` frame so the
/// client can report its playing state.
pub async fn radio_events(
    State(state): State<Arc<AppState>>,
    cookies: CookieJar,
    headers: HeaderMap,
) -> Response {
    let identity = match current_user(&state, &cookies, &headers).await {
        Some(user) => ListenerIdentity::user(user.id, user.username, user.avatar_url),
        None => ListenerIdentity::guest(),
    };

    let keepalive = state.config.get().live.keepalive();
    let conn = LiveConnection::open(state.hub.clone(), state.listeners.clone(), &identity);

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Body::from_stream(conn.into_stream(keepalive)),
    )
        .into_response()
}

pub async fn active_listeners(State(state): State<Arc<AppState>>) -> Json<ActiveListeners> {
    Json(ActiveListeners {
        listeners: state.listeners.list_active(),
    })
}

#[derive(Deserialize)]
pub struct UpdatePlayingStateRequest {
    pub listener_id: ListenerId,
    pub is_playing: bool,
}

/// Player state report; unknown or expired listener IDs are ignored
pub async fn update_playing_state(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdatePlayingStateRequest>,
) -> Json<StatusResponse> {
    state.listeners.set_playing(&req.listener_id, req.is_playing);
    Json(StatusResponse { status: "ok" })
}

// ============================================================================
// Now playing
// ============================================================================

/// Placeholder returned when the radio engine is unreachable
#[derive(Serialize)]
pub struct NowPlayingFallback {
    pub title: &'static str,
    pub artist: &'static str,
    pub thumbnail: Option<String>,
    #[serde(rename = "songId")]
    pub song_id: &'static str,
    #[serde(rename = "streamUrl")]
    pub stream_url: Option<String>,
}

impl NowPlayingFallback {
    fn new(stream_url: Option<String>) -> Self {
        Self {
            title: "Unknown",
            artist: "Unknown",
            thumbnail: None,
            song_id: "",
            stream_url,
        }
    }
}

async fn fetch_now_playing(state: &AppState) -> Option<NowPlaying> {
    match state.upstream.now_playing().await {
        Ok(np) => np,
        Err(e) => {
            warn!("Now-playing lookup failed: {}", e);
            None
        }
    }
}

pub async fn now_playing(State(state): State<Arc<AppState>>) -> Response {
    match fetch_now_playing(&state).await {
        Some(np) => Json(np).into_response(),
        None => {
            let stream_url = state.config.get().upstream.stream_url.clone();
            Json(NowPlayingFallback::new(stream_url.filter(|u| !u.is_empty()))).into_response()
        }
    }
}

#[derive(Serialize)]
pub struct StreamUrlResponse {
    #[serde(rename = "streamUrl")]
    pub stream_url: String,
}

/// Pick the public stream URL: live station data, then the configured URL,
/// then this server's own stream path.
fn select_stream_url(
    live: Option<&NowPlaying>,
    configured: Option<&str>,
    public_base_url: &str,
) -> String {
    live.map(|np| np.stream_url.as_str())
        .filter(|url| !url.is_empty())
        .or(configured.filter(|url| !url.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!("{}/api/radio/stream", public_base_url.trim_end_matches('/'))
        })
}

pub async fn stream_url(State(state): State<Arc<AppState>>) -> Json<StreamUrlResponse> {
    let live = fetch_now_playing(&state).await;
    let config = state.config.get();
    Json(StreamUrlResponse {
        stream_url: select_stream_url(
            live.as_ref(),
            config.upstream.stream_url.as_deref(),
            &config.web.public_base_url,
        ),
    })
}

// ============================================================================
// Webhooks
// ============================================================================

fn default_update_type() -> String {
    "song_change".to_string()
}

#[derive(Deserialize)]
pub struct RadioUpdateRequest {
    #[serde(rename = "type", default = "default_update_type")]
    pub event_type: String,
}

/// Refresh trigger from the radio engine or internal services
///
/// Unknown types are acknowledged without publishing anything.
pub async fn radio_update_webhook(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RadioUpdateRequest>,
) -> Result<Json<StatusResponse>> {
    match RefreshKind::parse(&req.event_type) {
        Some(kind) => {
            let limit = state.config.get().upstream.recent_songs_limit;
            publish_snapshot(state.upstream.as_ref(), &state.hub, kind, limit)
                .await
                .inspect_err(|e| error!("Radio update webhook failed: {}", e))?;
        }
        None => debug!("Ignoring radio update of type {:?}", req.event_type),
    }

    Ok(Json(StatusResponse { status: "success" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{SessionStore, SESSION_COOKIE};
    use crate::config::ConfigStore;
    use crate::events::BroadcastHub;
    use crate::listeners::ListenerRegistry;
    use crate::upstream::{NextSong, NowPlayingSource, RecentSong};
    use async_trait::async_trait;
    use axum_extra::extract::cookie::Cookie;
    use futures::StreamExt;
    use tokio::sync::broadcast;

    struct StaticSource(Option<NowPlaying>);

    #[async_trait]
    impl NowPlayingSource for StaticSource {
        async fn now_playing(&self) -> Result<Option<NowPlaying>> {
            Ok(self.0.clone())
        }

        async fn recent_songs(&self, _limit: usize) -> Result<Option<Vec<RecentSong>>> {
            Ok(None)
        }

        async fn next_song(&self) -> Result<Option<NextSong>> {
            Ok(None)
        }
    }

    fn playing(stream_url: &str) -> NowPlaying {
        NowPlaying {
            title: "Song".to_string(),
            artist: "Band".to_string(),
            thumbnail: None,
            song_id: "42".to_string(),
            stream_url: stream_url.to_string(),
        }
    }

    async fn test_state(np: Option<NowPlaying>) -> (tempfile::TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigStore::new(&dir.path().join("test.db")).await.unwrap();
        let sessions = SessionStore::new(config.pool().clone(), 3600);
        let (shutdown_tx, _) = broadcast::channel(1);
        let state = AppState::new(
            config,
            sessions,
            Arc::new(BroadcastHub::new()),
            Arc::new(ListenerRegistry::new()),
            Arc::new(StaticSource(np)),
            shutdown_tx,
        );
        (dir, state)
    }

    #[test]
    fn test_select_stream_url_order() {
        let live = playing("https://radio/live.mp3");
        let empty = playing("");
        let base = "https://app.example.com/";

        assert_eq!(
            select_stream_url(Some(&live), Some("https://cfg"), base),
            "https://radio/live.mp3"
        );
        assert_eq!(
            select_stream_url(Some(&empty), Some("https://cfg"), base),
            "https://cfg"
        );
        assert_eq!(
            select_stream_url(None, Some(""), base),
            "https://app.example.com/api/radio/stream"
        );
    }

    #[tokio::test]
    async fn test_guest_event_stream_lifecycle() {
        let (_dir, state) = test_state(None).await;

        let response = radio_events(
            State(state.clone()),
            CookieJar::new(),
            HeaderMap::new(),
        )
        .await;
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(response.headers()["x-accel-buffering"], "no");

        let listeners = state.listeners.list_active();
        assert_eq!(listeners.len(), 1);
        assert!(listeners[0].is_guest);
        assert_eq!(listeners[0].username, "Gość");

        let mut body = response.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        let expected = format!(
            "data: {{\"type\":\"connected\",\"listener_id\":\"{}\"}}\n\n",
            listeners[0].id
        );
        assert_eq!(first, expected.as_bytes());

        drop(body);
        assert!(state.listeners.list_active().is_empty());
        assert_eq!(state.hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_signed_in_listener_and_playing_state() {
        let (_dir, state) = test_state(None).await;
        state
            .sessions
            .upsert_user(5, "Alice", None, false)
            .await
            .unwrap();
        let session = state.sessions.create(5).await.unwrap();
        let cookies = CookieJar::new().add(Cookie::new(SESSION_COOKIE, session.id));

        let _response = radio_events(State(state.clone()), cookies, HeaderMap::new()).await;
        let Json(active) = active_listeners(State(state.clone())).await;
        assert_eq!(active.listeners.len(), 1);
        let listener = &active.listeners[0];
        assert_eq!(listener.user_id, Some(5));
        assert_eq!(listener.username, "Alice");
        assert!(!listener.is_playing);

        let Json(ack) = update_playing_state(
            State(state.clone()),
            Json(UpdatePlayingStateRequest {
                listener_id: listener.id.clone(),
                is_playing: true,
            }),
        )
        .await;
        assert_eq!(ack.status, "ok");
        assert_eq!(state.listeners.playing_users(), vec![5]);
    }

    #[tokio::test]
    async fn test_webhook_publishes_selected_feed() {
        let (_dir, state) = test_state(Some(playing("https://radio/live.mp3"))).await;
        let mut sub = state.hub.subscribe();

        let Json(ack) = radio_update_webhook(
            State(state.clone()),
            Json(RadioUpdateRequest {
                event_type: "next_song".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(ack.status, "success");
        assert_eq!(
            &*sub.try_recv().unwrap(),
            "data: {\"type\": \"next_song\", \"data\": {}}\n\n"
        );
        assert!(sub.try_recv().is_none());

        // Unknown types are acknowledged but publish nothing
        radio_update_webhook(
            State(state.clone()),
            Json(RadioUpdateRequest {
                event_type: "bogus".to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_handlers_use_runtime_overrides() {
        let (_dir, state) = test_state(None).await;

        let Json(resp) = stream_url(State(state.clone())).await;
        assert_eq!(resp.stream_url, "http://localhost:9523/api/radio/stream");

        state.config.apply_overrides(|c| {
            c.upstream.stream_url = Some("https://radio.example.com/listen".to_string());
            c.web.public_base_url = "https://app.example.com".to_string();
        });

        let Json(resp) = stream_url(State(state.clone())).await;
        assert_eq!(resp.stream_url, "https://radio.example.com/listen");

        let response = now_playing(State(state.clone())).await;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["title"], "Unknown");
        assert_eq!(json["streamUrl"], "https://radio.example.com/listen");
    }

    #[tokio::test]
    async fn test_stream_url_uses_overridden_base_url() {
        let (_dir, state) = test_state(None).await;
        state
            .config
            .apply_overrides(|c| c.web.public_base_url = "https://app.example.com/".to_string());

        let Json(resp) = stream_url(State(state)).await;
        assert_eq!(resp.stream_url, "https://app.example.com/api/radio/stream");
    }

    #[test]
    fn test_webhook_type_defaults_to_song_change() {
        let req: RadioUpdateRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.event_type, "song_change");
    }
}
