use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    auth::cookies::request_lookup,
    auth::local::{self, LocalValidation},
    error::AppError,
    models::session::AuthenticatedSession,
    session_store::SessionEvent,
    state::AppState,
};

/// The identity attached to a request once both the local fast path and the
/// authoritative provider check have passed.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    /// The provider-confirmed subject id.
    pub id: Uuid,
    /// The email on record, when the provider exposes one.
    pub email: Option<String>,
    /// The session reconstructed from the cookie.
    pub session: AuthenticatedSession,
}

/// Page routes and how the edge gate treats them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// Requires a plausible session; unauthenticated visitors go to /login.
    Protected,
    /// Only for signed-out visitors; authenticated ones go home.
    GuestOnly,
    /// Served to everyone.
    Public,
}

const PROTECTED_PAGES: &[&str] = &["/dashboard", "/conversations"];
const GUEST_ONLY_PAGES: &[&str] = &["/login", "/signup"];

/// Classifies a request path for the edge redirect gate.
///
/// API routes and the public /respond pages are never gated here; guests
/// reach them without any provider cookie.
pub fn page_kind(path: &str) -> PageKind {
    if path.starts_with("/api/") || path == "/respond" || path.starts_with("/respond/") {
        return PageKind::Public;
    }
    if PROTECTED_PAGES
        .iter()
        .any(|p| path == *p || path.starts_with(&format!("{}/", p)))
    {
        return PageKind::Protected;
    }
    if GUEST_ONLY_PAGES.contains(&path) {
        return PageKind::GuestOnly;
    }
    PageKind::Public
}

/// A middleware that requires a provider-verified session on API routes.
///
/// Local validation runs first with zero network; only a `Valid` outcome is
/// worth the authoritative round trip. Any provider error fails closed, and
/// a provider *rejection* of a locally-valid token additionally publishes a
/// sign-out notice so other replicas and tabs drop their cached session.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The inner `Response`, or the error response for the failed check.
pub async fn require_session(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let outcome = local::validate_local(
        request_lookup(&cookies),
        &state.config.auth_cookie_name,
        chrono::Utc::now().timestamp(),
    );
    local::audit(&outcome, state.config.auth_debug);

    let session = match outcome {
        LocalValidation::Valid(session) => session,
        _ => {
            return AppError::Authentication("Authentication required".to_string())
                .into_response();
        }
    };

    let user = match state.verifier.verify(&session.access_token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("❌ Provider rejected a locally-valid token: {}", e);
            state.sessions.publish(SessionEvent::SignedOut);
            return AppError::Authentication("Authentication required".to_string())
                .into_response();
        }
    };

    tracing::debug!("✅ Session verified for subject: {}", user.id);

    request.extensions_mut().insert(AuthedUser {
        id: user.id,
        email: user.email,
        session,
    });

    next.run(request).await
}

/// The edge redirect gate for page routes.
///
/// Decisions here use the local fast path only, no network: a wrong redirect
/// costs one page load, while the API layer still enforces the authoritative
/// check. Malformed cookies fail closed to the signed-out branch, which
/// never redirect-loops because /login is itself a guest-only page.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The inner `Response`, or a redirect for the mismatched page kind.
pub async fn gate_pages(
    State(state): State<AppState>,
    cookies: Cookies,
    request: Request<Body>,
    next: Next,
) -> Response {
    let kind = page_kind(request.uri().path());
    if kind == PageKind::Public {
        return next.run(request).await;
    }

    let outcome = local::validate_local(
        request_lookup(&cookies),
        &state.config.auth_cookie_name,
        chrono::Utc::now().timestamp(),
    );
    local::audit(&outcome, state.config.auth_debug);

    match (kind, outcome.is_valid()) {
        (PageKind::Protected, false) => Redirect::to("/login").into_response(),
        (PageKind::GuestOnly, true) => Redirect::to("/").into_response(),
        _ => next.run(request).await,
    }
}
