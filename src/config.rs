use anyhow::{Context, Result};
use std::env;
use zeroize::Zeroizing;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// Base URL of the hosted auth provider.
    pub auth_base_url: String,
    /// Service key presented to the provider on the authoritative check.
    pub auth_service_key: Zeroizing<String>,
    /// Base name of the provider auth cookie. Chunked variants arrive as
    /// `<name>.0`, `<name>.1`, …
    pub auth_cookie_name: String,
    /// Enables the local-validation audit log. Reason codes only, never
    /// token values.
    pub auth_debug: bool,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            auth_base_url: env::var("AUTH_BASE_URL")
                .context("AUTH_BASE_URL must be set (the hosted auth provider)")?,
            auth_service_key: Zeroizing::new(
                env::var("AUTH_SERVICE_KEY").context("AUTH_SERVICE_KEY must be set")?,
            ),
            auth_cookie_name: env::var("AUTH_COOKIE_NAME")
                .unwrap_or_else(|_| "pv-session".to_string()),
            auth_debug: env::var("AUTH_DEBUG")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }
}
