use nautilus_backend::config::Config;
use nautilus_backend::{MojangProvider, ProfileDirectory, RateLimitConfig, Timeouts, create_app};
use nautilus_db::Database;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() {
    // Initialize tracing for structured logging
    #[cfg(debug_assertions)]
    let log_level = tracing::Level::DEBUG;
    #[cfg(not(debug_assertions))]
    let log_level = tracing::Level::INFO;

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();
    tracing::info!("Starting Nautilus profile directory...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        "Configuration: port={}, db_path={}, body_limit={}KB, timeout={}s, store_timeout={}ms, provider_timeout={}ms",
        config.port,
        config.database_path,
        config.request_body_limit / 1024,
        config.request_timeout.as_secs(),
        config.store_timeout.as_millis(),
        config.provider_timeout.as_millis()
    );
    tracing::info!(
        "Rate limits: event={}/sec (burst {}), query={}/sec (burst {})",
        config.rate_limit_event_per_sec,
        config.rate_limit_event_burst,
        config.rate_limit_query_per_sec,
        config.rate_limit_query_burst
    );

    let db = match Database::open(&config.database_path).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to open database {}: {}", config.database_path, e);
            std::process::exit(1);
        }
    };
    let provider = match MojangProvider::new(
        config.mojang_api_url.clone(),
        config.mojang_session_url.clone(),
        config.provider_timeout,
    ) {
        Ok(provider) => provider,
        Err(e) => {
            tracing::error!("Failed to build Mojang client: {}", e);
            std::process::exit(1);
        }
    };

    let directory = Arc::new(ProfileDirectory::new(
        Arc::new(db),
        Arc::new(provider),
        Timeouts {
            store: config.store_timeout,
            provider: config.provider_timeout,
        },
    ));

    // Log every recorded profile change
    let mut changes = directory.subscribe();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => tracing::debug!(
                    id = %change.profile.id(),
                    name = ?change.profile.last_known_name,
                    connected = change.previous.is_some(),
                    "profile changed"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "change logger fell behind")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let rate_limit = RateLimitConfig {
        event_per_sec: config.rate_limit_event_per_sec,
        event_burst: config.rate_limit_event_burst,
        query_per_sec: config.rate_limit_query_per_sec,
        query_burst: config.rate_limit_query_burst,
    };
    let app = create_app(
        directory,
        config.host_token.clone(),
        config.request_body_limit,
        config.request_timeout,
        rate_limit,
    );

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Server listening on {}", addr);

    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    if let Err(e) = result {
        tracing::error!("Axum server error: {}", e);
    }
    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
