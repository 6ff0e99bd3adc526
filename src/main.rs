use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use radio_live::auth::SessionStore;
use radio_live::config::{AppConfig, ConfigStore};
use radio_live::events::BroadcastHub;
use radio_live::listeners::ListenerRegistry;
use radio_live::state::AppState;
use radio_live::upstream::{AzuraCastClient, NowPlayingPoller, NowPlayingSource};
use radio_live::web;

/// Expired sessions are purged this often
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// radio-live command line arguments
#[derive(Parser, Debug)]
#[command(name = "radio-live")]
#[command(version, about = "Live now-playing feed and listener presence for web radio", long_about = None)]
struct CliArgs {
    /// Listen address (overrides database config)
    #[arg(short = 'a', long, value_name = "ADDRESS")]
    address: Option<String>,

    /// HTTP port (overrides database config)
    #[arg(short = 'p', long, value_name = "PORT")]
    http_port: Option<u16>,

    /// AzuraCast base URL (overrides database config and environment)
    #[arg(short = 'u', long, value_name = "URL")]
    upstream_url: Option<String>,

    /// Data directory path (default: /var/lib/radio-live)
    #[arg(short = 'd', long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Initialize logging with CLI arguments
    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting radio-live v{}", env!("CARGO_PKG_VERSION"));

    // Determine data directory (CLI arg takes precedence)
    let data_dir = args.data_dir.unwrap_or_else(get_data_dir);
    tracing::info!("Data directory: {}", data_dir.display());

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir).await?;

    // Initialize configuration store
    let db_path = data_dir.join("radio-live.db");
    let config_store = ConfigStore::new(&db_path).await?;

    // Environment, then CLI overrides (not persisted)
    let config = config_store.apply_overrides(|config| {
        apply_env_overrides(config, |key| std::env::var(key).ok());
        if let Some(addr) = args.address {
            config.web.bind_address = addr;
        }
        if let Some(port) = args.http_port {
            config.web.http_port = port;
        }
        if let Some(url) = args.upstream_url {
            config.upstream.api_url = url;
        }
    });

    let bind_addr: SocketAddr =
        format!("{}:{}", config.web.bind_address, config.web.http_port).parse()?;
    tracing::info!("Server will listen on: http://{}", bind_addr);

    if config.upstream.is_configured() {
        tracing::info!(
            "Upstream: {} (station {})",
            config.upstream.api_url,
            config.upstream.station_id
        );
    } else {
        tracing::warn!("AzuraCast URL not configured, now-playing feed disabled");
    }

    // Initialize session store
    let session_store = SessionStore::new(
        config_store.pool().clone(),
        config.auth.session_timeout_secs as i64,
    );

    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Live feed
    let hub = Arc::new(BroadcastHub::new());
    let listeners = Arc::new(ListenerRegistry::with_timeout(
        config.live.inactivity_timeout(),
    ));
    tracing::info!(
        "Listener registry initialized (inactivity timeout: {}s)",
        listeners.inactivity_timeout().as_secs()
    );

    let upstream: Arc<dyn NowPlayingSource> = Arc::new(AzuraCastClient::new(
        &config.upstream,
        &config.web.public_base_url,
    )?);

    let state = AppState::new(
        config_store,
        session_store,
        hub.clone(),
        listeners,
        upstream.clone(),
        shutdown_tx.clone(),
    );

    // Background tasks
    if config.upstream.is_configured() {
        NowPlayingPoller::new(
            upstream,
            hub,
            config.upstream.poll_interval(),
            config.upstream.recent_songs_limit,
        )
        .spawn(state.shutdown_signal());
    }
    spawn_session_cleanup(state.sessions.clone(), state.shutdown_signal());

    // Create router
    let app = web::create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Starting HTTP server on {}", listener.local_addr()?);

    // Setup graceful shutdown
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    };

    // Live streams never finish on their own, so the server is dropped on
    // shutdown rather than drained.
    tokio::select! {
        _ = shutdown_signal => {}
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                tracing::error!("HTTP server error: {}", e);
            }
        }
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    // Build filter string based on effective level
    let filter = match effective_level {
        LogLevel::Error => "radio_live=error,tower_http=error",
        LogLevel::Warn => "radio_live=warn,tower_http=warn",
        LogLevel::Info => "radio_live=info,tower_http=info",
        LogLevel::Verbose => "radio_live=debug,tower_http=info",
        LogLevel::Debug => "radio_live=debug,tower_http=debug",
        LogLevel::Trace => "radio_live=trace,tower_http=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

/// Get the application data directory
fn get_data_dir() -> PathBuf {
    // Check environment variable first
    if let Ok(path) = std::env::var("RADIO_LIVE_DATA_DIR") {
        return PathBuf::from(path);
    }

    PathBuf::from("/var/lib/radio-live")
}

/// Apply deployment environment variables on top of the stored config
fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = var("AZURACAST_API_URL") {
        config.upstream.api_url = url;
    }
    if let Some(key) = var("AZURACAST_API_KEY") {
        config.upstream.api_key = Some(key);
    }
    if let Some(station) = var("AZURACAST_STATION_ID") {
        config.upstream.station_id = station;
    }
    if let Some(url) = var("AZURACAST_STREAM_URL") {
        config.upstream.stream_url = Some(url);
    }
    if let Some(url) = var("APP_BASE_URL") {
        config.web.public_base_url = url;
    }
}

/// Periodically purge expired sessions
fn spawn_session_cleanup(sessions: SessionStore, mut shutdown: broadcast::Receiver<()>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => match sessions.cleanup_expired().await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!("Removed {} expired sessions", n),
                    Err(e) => tracing::warn!("Session cleanup failed: {}", e),
                },
            }
        }
    });
}
