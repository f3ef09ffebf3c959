mod cache;
mod changes;
pub mod config;
mod directory;
mod error;
mod events;
pub mod helpers;
mod inflight;
pub mod provider;
mod routes;
pub mod skin;
mod store;
mod validation;

pub use changes::ProfileChanged;
pub use directory::{ProfileDirectory, Timeouts};
pub use error::{AppError, DirectoryError, ErrorResponse};
pub use events::ConnectionEvent;
pub use provider::{IdentityProvider, MojangProvider, ProviderError, ResolvedIdentity};
pub use store::ProfileStore;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

pub struct AppState {
    pub directory: Arc<ProfileDirectory>,
    /// Bearer token the game server must present
    pub host_token: String,
}

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per second for lifecycle endpoints (/events/*, /sync)
    pub event_per_sec: u64,
    /// Burst size for lifecycle endpoints
    pub event_burst: u32,
    /// Requests per second for profile queries and /status
    pub query_per_sec: u64,
    /// Burst size for profile queries
    pub query_burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            event_per_sec: 50,
            event_burst: 100,
            query_per_sec: 10,
            query_burst: 20,
        }
    }
}

/// Create the host bridge router in front of `directory`
pub fn create_app(
    directory: Arc<ProfileDirectory>,
    host_token: String,
    request_body_limit: usize,
    request_timeout: Duration,
    rate_limit: RateLimitConfig,
) -> Router {
    let state = Arc::new(AppState {
        directory,
        host_token,
    });

    // Lenient rate limit for lifecycle events - a restart reconnects everyone at once
    let event_governor = GovernorConfigBuilder::default()
        .per_second(rate_limit.event_per_sec.max(1))
        .burst_size(rate_limit.event_burst.max(1))
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("non-zero event rate limit");

    // Queries may hit the identity provider, keep them tighter
    let query_governor = GovernorConfigBuilder::default()
        .per_second(rate_limit.query_per_sec.max(1))
        .burst_size(rate_limit.query_burst.max(1))
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("non-zero query rate limit");

    let event_routes = Router::new()
        .route("/events/pre-connect", post(routes::pre_connect))
        .route("/events/connect", post(routes::connect))
        .route("/events/disconnect", post(routes::disconnect))
        .route("/events/quit", post(routes::quit))
        .route("/sync", post(routes::sync))
        .layer(GovernorLayer::new(event_governor));

    let query_routes = Router::new()
        .route("/profiles/{id}", get(routes::profile_by_id))
        .route("/profiles/by-name/{name}", get(routes::profile_by_name))
        .route("/status", get(routes::status))
        .layer(GovernorLayer::new(query_governor));

    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .merge(event_routes)
        .merge(query_routes)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(RequestBodyLimitLayer::new(request_body_limit))
        .with_state(state)
}
