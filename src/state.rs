use deadpool_postgres::Pool;
use redis::aio::ConnectionManager;
use std::sync::Arc;

use crate::auth::provider::{AuthApiVerifier, SessionVerifier};
use crate::config::Config;
use crate::error::Result;
use crate::session_store::{SessionStore, VerifierRefresher};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: Pool,
    /// The Redis connection manager.
    pub redis: ConnectionManager,
    /// The application's configuration.
    pub config: Config,
    /// The authoritative session check against the hosted provider.
    pub verifier: Arc<dyn SessionVerifier>,
    /// The cached session state with cross-process invalidation.
    pub sessions: SessionStore,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = crate::db::create_pool(&config.database_url)?;
        tracing::info!("✅ PostgreSQL pool initialized with deadpool-postgres");

        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let redis = ConnectionManager::new(redis_client).await?;
        tracing::info!("✅ Redis connection manager initialized");

        let verifier: Arc<dyn SessionVerifier> = Arc::new(AuthApiVerifier::new(
            config.auth_base_url.clone(),
            config.auth_service_key.clone(),
        ));
        tracing::info!("✅ Provider verifier ready for {}", config.auth_base_url);

        let sessions = SessionStore::new(Arc::new(VerifierRefresher::new(verifier.clone())));
        tracing::info!("✅ Session store initialized");

        Ok(AppState {
            db,
            redis,
            config: config.clone(),
            verifier,
            sessions,
        })
    }
}
