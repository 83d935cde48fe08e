//! Videocall Controller
//!
//! Entry point for the Crema videocall control plane. Orchestrates
//! meeting sessions against the external RTC provider and persists
//! presence, transcripts and shared-file metadata.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vc_service::config::Config;
use vc_service::observability::metrics::init_metrics_recorder;
use vc_service::repositories::{
    PgChatLogStore, PgParticipantStore, PgSessionStore, PgSharedFileStore, SessionStore,
};
use vc_service::routes::{self, AppState};
use vc_service::services::{
    ChatService, OpenViduClient, RtcClient, RtcUrls, SharedFileService, VideoCallService,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vc_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Videocall Controller");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        rtc_base_url = %config.rtc_base_url,
        rtc_timeout_secs = config.rtc_timeout_secs,
        "Configuration loaded successfully"
    );

    // Install Prometheus recorder before anything records metrics
    let metrics_handle = match init_metrics_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics recorder not installed: {}", e);
            None
        }
    };

    // Initialize database connection pool with query timeout
    info!("Connecting to database...");
    let db_url_with_timeout = add_query_timeout(&config.database_url, 5);
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&db_url_with_timeout)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    info!("Database connection established");

    // Apply pending migrations
    sqlx::migrate!("../../migrations").run(&db_pool).await?;

    // Wire stores, provider client and services
    let sessions: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(db_pool.clone()));
    let participants = Arc::new(PgParticipantStore::new(db_pool.clone()));
    let chat_logs = Arc::new(PgChatLogStore::new(db_pool.clone()));
    let shared_files = Arc::new(PgSharedFileStore::new(db_pool.clone()));

    let rtc: Arc<dyn RtcClient> = Arc::new(OpenViduClient::new(
        config.rtc_base_url.clone(),
        config.rtc_secret.clone(),
        Duration::from_secs(config.rtc_timeout_secs),
    )?);

    let rtc_urls = RtcUrls {
        server_url: config.rtc_public_url.clone(),
        web_socket_url: config.rtc_websocket_url(),
    };

    let state = Arc::new(AppState {
        video_call: VideoCallService::new(
            sessions.clone(),
            participants.clone(),
            rtc.clone(),
            rtc_urls,
        ),
        chat: ChatService::new(chat_logs, sessions.clone(), participants),
        files: SharedFileService::new(shared_files, sessions.clone()),
        sessions,
        metrics_handle,
    });

    // Build application routes
    let app = routes::build_routes(state);

    // Parse bind address
    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Videocall Controller listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Videocall Controller shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    // Graceful shutdown drain period
    let drain_secs: u64 = std::env::var("VC_DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (VC_DRAIN_SECONDS=0)");
    }
}

/// Adds statement_timeout to the database URL.
/// This ensures queries don't hang indefinitely.
fn add_query_timeout(url: &str, timeout_secs: u32) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}options=-c%20statement_timeout%3D{}s",
        url, separator, timeout_secs
    )
}
