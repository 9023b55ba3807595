use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use http::{Method, header};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_cookies::CookieManagerLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod session_store;
mod state;

mod auth {
    pub mod claims;
    pub mod cookies;
    pub mod local;
    pub mod provider;
}

mod crypto {
    pub mod token;
}

mod models {
    pub mod conversation;
    pub mod guest_session;
    pub mod session;
    pub mod share_link;
}

mod repositories {
    pub mod conversation;
    pub mod guest_session;
    pub mod share_link;
}

mod services {
    pub mod guest_gate;
    pub mod guest_session;
    pub mod share_link;
}

mod handlers {
    pub mod guest;
    pub mod share_link;
}

mod middleware_layer {
    pub mod auth;
    pub mod rate_limit;
}

mod validation {
    pub mod token;
}

use config::Config;
use state::AppState;

/// How long an expired share link is kept before the cleanup job deletes it
/// (and, by cascade, its guest sessions).
const EXPIRED_LINK_RETENTION_DAYS: i64 = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::new(&config).await?;
    tracing::info!("✅ AppState initialized with optimized pools");

    session_store::spawn_redis_bridge(state.sessions.clone(), state.config.redis_url.clone());
    tracing::info!("✅ Session bridge started");

    let cors = CorsLayer::new()
        .allow_origin([
            "http://localhost:3000".parse().unwrap(),
            "http://127.0.0.1:3000".parse().unwrap(),
            "http://[::1]:3000".parse().unwrap(),
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::COOKIE,
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86400));

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10_000)
            .burst_size(50_000)
            .use_headers()
            .finish()
            .unwrap(),
    );

    let share_link_routes = Router::new()
        .route(
            "/api/conversations/{id}/share-link",
            post(handlers::share_link::create_share_link)
                .get(handlers::share_link::get_share_link)
                .delete(handlers::share_link::revoke_share_link),
        )
        .layer(tower_governor::GovernorLayer::new(governor_conf.clone()))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_session,
        ))
        .with_state(state.clone());

    let guest_mint_routes = Router::new()
        .route(
            "/api/respond/{token}/session",
            post(handlers::guest::create_guest_session),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_guest_session,
        ))
        .with_state(state.clone());

    let guest_routes = Router::new()
        .route("/api/respond/{token}", get(handlers::guest::resolve_share_link))
        .route(
            "/api/respond/{token}/conversation",
            get(handlers::guest::guest_conversation),
        )
        .with_state(state.clone());

    // The fallback is registered before the layers so the page gate also
    // wraps the statically served pages.
    let app = Router::new()
        .merge(share_link_routes)
        .merge(guest_mint_routes)
        .merge(guest_routes)
        .fallback_service(ServeDir::new("files/public"))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::gate_pages,
        ))
        .layer(CookieManagerLayer::new())
        .layer(cors);

    let cleanup_state = state.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            tracing::info!("🧹 Running scheduled cleanup of expired share links...");
            match services::share_link::purge_expired(
                &cleanup_state.db,
                chrono::Duration::days(EXPIRED_LINK_RETENTION_DAYS),
            )
            .await
            {
                Ok(_) => {
                    tracing::info!("✅ Cleanup job completed successfully");
                }
                Err(e) => {
                    tracing::error!("❌ Cleanup job failed: {}", e);
                }
            }
        }
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    tracing::info!("🚀 Server listening on http://{}", addr);
    tracing::info!("✅ Background cleanup job started (runs every hour)");
    tracing::info!("✅ All systems operational");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
