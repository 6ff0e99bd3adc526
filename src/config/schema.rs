use serde::{Deserialize, Serialize};
use std::time::Duration;
use typeshare::typeshare;

use crate::listeners::DEFAULT_INACTIVITY_TIMEOUT;
use crate::live::KEEPALIVE_INTERVAL;

/// Main application configuration
#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Authentication settings
    pub auth: AuthConfig,
    /// Upstream radio engine (AzuraCast) settings
    pub upstream: UpstreamConfig,
    /// Live event feed settings
    pub live: LiveConfig,
    /// Web server settings
    pub web: WebConfig,
}

/// Authentication configuration
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Session timeout in seconds
    pub session_timeout_secs: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: 3600 * 24 * 7, // 7 days
        }
    }
}

/// Upstream radio engine configuration
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// AzuraCast base URL (e.g., https://radio.example.com). Empty disables polling.
    pub api_url: String,
    /// Optional API key sent as `X-API-Key`
    pub api_key: Option<String>,
    /// Station short name or numeric ID
    pub station_id: String,
    /// Fallback public stream URL when the station exposes none
    pub stream_url: Option<String>,
    /// Now-playing poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
    /// Number of history entries published with `recent_songs`
    pub recent_songs_limit: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: None,
            station_id: "1".to_string(),
            stream_url: None,
            poll_interval_ms: 2000,
            request_timeout_secs: 10,
            recent_songs_limit: 10,
        }
    }
}

impl UpstreamConfig {
    /// Whether an upstream URL has been configured
    pub fn is_configured(&self) -> bool {
        !self.api_url.trim().is_empty()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(100))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Live event feed configuration
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LiveConfig {
    /// Seconds of silence before a keepalive frame is sent
    pub keepalive_secs: u64,
    /// Seconds without activity before a listener is evicted
    pub inactivity_timeout_secs: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: KEEPALIVE_INTERVAL.as_secs(),
            inactivity_timeout_secs: DEFAULT_INACTIVITY_TIMEOUT.as_secs(),
        }
    }
}

impl LiveConfig {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs.max(1))
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs.max(1))
    }
}

/// Web server configuration
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebConfig {
    /// HTTP port
    pub http_port: u16,
    /// Bind address
    pub bind_address: String,
    /// Public base URL of this application, used for the stream proxy fallback
    pub public_base_url: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            http_port: 9523,
            bind_address: "0.0.0.0".to_string(),
            public_base_url: "http://localhost:9523".to_string(),
        }
    }
}
