use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_cookies::{Cookie, Cookies, cookie::time::Duration};
use uuid::Uuid;

use crate::{
    auth::cookies::request_lookup,
    error::Result,
    models::conversation::ConversationType,
    services::guest_gate::{self, GuestAccessError},
    services::guest_session::{self, GUEST_SESSION_COOKIE},
    services::share_link,
    state::AppState,
    validation::token::share_token_shape_ok,
};

/// Cookie remembering which invite brought the guest here.
pub const INVITE_TOKEN_COOKIE: &str = "invite_token";

const INVITE_TOKEN_MAX_AGE_SECS: i64 = 3600;

/// Builds a guest-facing cookie: httpOnly, SameSite=Lax, path `/`,
/// secure in production, with an explicit max-age in seconds.
fn create_guest_cookie(name: &'static str, value: String, max_age_secs: i64) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);

    let is_production =
        std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()) == "production";

    cookie.set_http_only(true);
    if is_production {
        cookie.set_secure(true);
    }
    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_max_age(Duration::seconds(max_age_secs));
    cookie.set_path("/");

    cookie
}

/// What an anonymous visitor sees on the respond page.
#[derive(Serialize)]
pub struct RespondPageResponse {
    pub conversation_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub conversation_type: ConversationType,
    pub expires_at: DateTime<Utc>,
}

/// The response payload for a freshly minted guest session.
#[derive(Serialize)]
pub struct GuestSessionResponse {
    pub guest_number: i32,
    pub conversation_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Conversation data as seen through the guest gate.
#[derive(Serialize)]
pub struct GuestConversationResponse {
    pub conversation_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub conversation_type: ConversationType,
    pub guest_number: i32,
}

/// Resolves a share-link token for the respond page.
///
/// Unknown, revoked, and expired tokens all answer `LINK_NOT_FOUND`; the
/// resolution never explains itself to an anonymous caller.
#[axum::debug_handler]
pub async fn resolve_share_link(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(token): Path<String>,
) -> Result<Response> {
    if !share_token_shape_ok(&token) {
        return Err(GuestAccessError::InvalidToken.into());
    }

    let resolved = share_link::resolve(&state.db, &token)
        .await?
        .ok_or(GuestAccessError::LinkNotFound)?;

    cookies.add(create_guest_cookie(
        INVITE_TOKEN_COOKIE,
        token,
        INVITE_TOKEN_MAX_AGE_SECS,
    ));

    Ok(Json(RespondPageResponse {
        conversation_id: resolved.conversation_id,
        title: resolved.title,
        description: resolved.description,
        conversation_type: resolved.conversation_type,
        expires_at: resolved.expires_at,
    })
    .into_response())
}

/// Mints a guest session under a share link and sets its cookie.
///
/// The session is bounded by the link's own expiry, so the cookie can never
/// outlast the link it was minted under.
#[axum::debug_handler]
pub async fn create_guest_session(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(token): Path<String>,
) -> Result<Response> {
    if !share_token_shape_ok(&token) {
        return Err(GuestAccessError::InvalidToken.into());
    }

    let resolved = share_link::resolve(&state.db, &token)
        .await?
        .ok_or(GuestAccessError::LinkNotFound)?;

    let now = Utc::now();
    let issued = guest_session::create(&state.db, &resolved.share_link_id, resolved.expires_at).await?;

    cookies.add(create_guest_cookie(
        GUEST_SESSION_COOKIE,
        issued.raw_token,
        guest_session::cookie_max_age_secs(resolved.expires_at, now),
    ));

    Ok((
        StatusCode::CREATED,
        Json(GuestSessionResponse {
            guest_number: issued.session.guest_number,
            conversation_id: resolved.conversation_id,
            expires_at: issued.session.expires_at,
        }),
    )
        .into_response())
}

/// Serves conversation data to a gated guest.
#[axum::debug_handler]
pub async fn guest_conversation(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(token): Path<String>,
) -> Result<Response> {
    let guest_cookie = request_lookup(&cookies)(GUEST_SESSION_COOKIE);

    let access =
        guest_gate::authorize(&state.db, &token, guest_cookie.as_deref(), Utc::now()).await?;

    tracing::debug!(
        "👤 Guest {} reading conversation {}",
        access.context.guest_number,
        access.conversation_id
    );

    Ok(Json(GuestConversationResponse {
        conversation_id: access.conversation_id,
        title: access.context.conversation_title,
        description: access.context.conversation_description,
        conversation_type: access.context.conversation_type,
        guest_number: access.context.guest_number,
    })
    .into_response())
}
