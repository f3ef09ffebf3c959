use std::env::var;
use std::time::Duration;

use dotenvy::dotenv;
use thiserror::Error;

pub const DEFAULT_MOJANG_API_URL: &str = "https://api.mojang.com";
pub const DEFAULT_MOJANG_SESSION_URL: &str = "https://sessionserver.mojang.com";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),
}

/// Application configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Request body size limit in bytes
    /// Env: REQUEST_BODY_LIMIT (default: 65536 = 64KB)
    pub request_body_limit: usize,

    /// Request timeout in seconds
    /// Env: REQUEST_TIMEOUT_SECS (default: 30)
    pub request_timeout: Duration,

    /// Server port
    /// Env: PORT (default: 3000)
    pub port: u16,

    /// Database file path
    /// Env: DATABASE_PATH (default: "nautilus.db")
    pub database_path: String,

    /// Shared secret the game server presents as a bearer token
    /// Env: HOST_TOKEN (required by from_env)
    pub host_token: String,

    /// Deadline for a single profile store call
    /// Env: STORE_TIMEOUT_MS (default: 5000)
    pub store_timeout: Duration,

    /// Deadline for a single identity provider call
    /// Env: PROVIDER_TIMEOUT_MS (default: 5000)
    pub provider_timeout: Duration,

    /// Base URL of the Mojang account API (name to UUID)
    /// Env: MOJANG_API_URL (default: "https://api.mojang.com")
    pub mojang_api_url: String,

    /// Base URL of the Mojang session server (UUID to name and skin)
    /// Env: MOJANG_SESSION_URL (default: "https://sessionserver.mojang.com")
    pub mojang_session_url: String,

    /// Rate limit for lifecycle event endpoints (requests per second)
    /// Env: RATE_LIMIT_EVENT_PER_SEC (default: 50)
    /// Lenient so a server restart can admit everyone at once
    pub rate_limit_event_per_sec: u64,

    /// Burst size for lifecycle event endpoints
    /// Env: RATE_LIMIT_EVENT_BURST (default: 100)
    pub rate_limit_event_burst: u32,

    /// Rate limit for profile queries (requests per second)
    /// Env: RATE_LIMIT_QUERY_PER_SEC (default: 10)
    pub rate_limit_query_per_sec: u64,

    /// Burst size for profile queries
    /// Env: RATE_LIMIT_QUERY_BURST (default: 20)
    pub rate_limit_query_burst: u32,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv(); //for debugging mostly
        let defaults = Self::default();
        Ok(Self {
            request_body_limit: env_or_default("REQUEST_BODY_LIMIT", defaults.request_body_limit),
            request_timeout: Duration::from_secs(env_or_default("REQUEST_TIMEOUT_SECS", 30)),
            port: env_or_default("PORT", defaults.port),
            database_path: env_or_default_string("DATABASE_PATH", &defaults.database_path),
            host_token: var("HOST_TOKEN")
                .ok()
                .filter(|token| !token.is_empty())
                .ok_or(ConfigError::Missing("HOST_TOKEN"))?,
            store_timeout: Duration::from_millis(env_or_default("STORE_TIMEOUT_MS", 5000)),
            provider_timeout: Duration::from_millis(env_or_default("PROVIDER_TIMEOUT_MS", 5000)),
            mojang_api_url: env_or_default_string("MOJANG_API_URL", DEFAULT_MOJANG_API_URL),
            mojang_session_url: env_or_default_string(
                "MOJANG_SESSION_URL",
                DEFAULT_MOJANG_SESSION_URL,
            ),
            rate_limit_event_per_sec: env_or_default("RATE_LIMIT_EVENT_PER_SEC", 50),
            rate_limit_event_burst: env_or_default("RATE_LIMIT_EVENT_BURST", 100),
            rate_limit_query_per_sec: env_or_default("RATE_LIMIT_QUERY_PER_SEC", 10),
            rate_limit_query_burst: env_or_default("RATE_LIMIT_QUERY_BURST", 20),
        })
    }
}

impl Default for Config {
    /// Configuration with all default values and an empty host token
    fn default() -> Self {
        Self {
            request_body_limit: 64 * 1024, // 64 KB
            request_timeout: Duration::from_secs(30),
            port: 3000,
            database_path: "nautilus.db".to_string(),
            host_token: String::new(),
            store_timeout: Duration::from_millis(5000),
            provider_timeout: Duration::from_millis(5000),
            mojang_api_url: DEFAULT_MOJANG_API_URL.to_string(),
            mojang_session_url: DEFAULT_MOJANG_SESSION_URL.to_string(),
            rate_limit_event_per_sec: 50,
            rate_limit_event_burst: 100,
            rate_limit_query_per_sec: 10,
            rate_limit_query_burst: 20,
        }
    }
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}
