use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use thiserror::Error;
use uuid::Uuid;

use crate::error::Result;
use crate::models::guest_session::GuestContext;
use crate::models::share_link::ResolvedShareLink;
use crate::services::{guest_session, share_link};
use crate::validation::token::share_token_shape_ok;

/// Why a guest request was turned away.
///
/// Each variant carries its own wire code and HTTP status. Temporal and
/// structural failures stay indistinguishable from "never existed"; only a
/// scope mismatch is called out explicitly, since that is a caller bug
/// rather than a probe.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestAccessError {
    /// The URL token cannot have been issued by us.
    #[error("Invalid share link token")]
    InvalidToken,

    /// No usable guest session accompanied the request.
    #[error("Guest session is missing or no longer valid")]
    SessionInvalid,

    /// The share link is unknown, revoked, or expired.
    #[error("Share link not found")]
    LinkNotFound,

    /// The guest session belongs to a different conversation than the link.
    #[error("Guest session does not match this conversation")]
    ScopeMismatch,
}

impl GuestAccessError {
    /// The JSON `code` field surfaced to the caller.
    pub fn code(&self) -> &'static str {
        match self {
            GuestAccessError::InvalidToken => "INVALID_TOKEN",
            GuestAccessError::SessionInvalid => "SESSION_INVALID",
            GuestAccessError::LinkNotFound => "LINK_NOT_FOUND",
            GuestAccessError::ScopeMismatch => "SCOPE_MISMATCH",
        }
    }

    /// The HTTP status paired with the code.
    pub fn status(&self) -> StatusCode {
        match self {
            GuestAccessError::InvalidToken => StatusCode::BAD_REQUEST,
            GuestAccessError::SessionInvalid => StatusCode::UNAUTHORIZED,
            GuestAccessError::LinkNotFound => StatusCode::NOT_FOUND,
            GuestAccessError::ScopeMismatch => StatusCode::FORBIDDEN,
        }
    }
}

/// An authorized guest request.
#[derive(Debug, Clone)]
pub struct GuestAccess {
    /// The validated guest identity and its conversation view.
    pub context: GuestContext,
    /// The conversation both credentials agree on.
    pub conversation_id: Uuid,
}

/// Whether a resolved link and a guest session agree on the conversation.
///
/// A guest session minted for one conversation must never authorize access
/// to another, even when both credentials are independently valid.
fn scope_matches(resolved: &ResolvedShareLink, session: &GuestContext) -> bool {
    resolved.conversation_id == session.conversation_id
}

/// The gate decision over already-fetched credentials.
///
/// Ordered: the session is judged before the link, so a revoked link behind
/// a cascade-failed session surfaces as `SessionInvalid`, never as an
/// oracle on the link itself.
fn decide(
    session: Option<GuestContext>,
    resolved: Option<ResolvedShareLink>,
) -> std::result::Result<GuestAccess, GuestAccessError> {
    let session = session.ok_or(GuestAccessError::SessionInvalid)?;
    let resolved = resolved.ok_or(GuestAccessError::LinkNotFound)?;

    if !scope_matches(&resolved, &session) {
        return Err(GuestAccessError::ScopeMismatch);
    }

    Ok(GuestAccess {
        conversation_id: session.conversation_id,
        context: session,
    })
}

/// Authorizes a guest API call carrying `(url_token, guest_cookie)`.
///
/// The token shape check runs before storage is touched; session validation
/// and link resolution then run independently and feed [`decide`]. Failures
/// travel as `Err`, so calling code cannot proceed past one.
///
/// # Arguments
///
/// * `pool` - The database connection pool.
/// * `url_token` - The share-link token from the request URL.
/// * `guest_cookie` - The raw guest session token, if the cookie was sent.
/// * `now` - The authorization instant.
///
/// # Returns
///
/// A `Result` containing the authorized `GuestAccess`.
pub async fn authorize(
    pool: &Pool,
    url_token: &str,
    guest_cookie: Option<&str>,
    now: DateTime<Utc>,
) -> Result<GuestAccess> {
    if !share_token_shape_ok(url_token) {
        return Err(GuestAccessError::InvalidToken.into());
    }

    let session = guest_session::validate(pool, guest_cookie, now).await?;
    let resolved = share_link::resolve(pool, url_token).await?;

    decide(session, resolved).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::conversation::ConversationType;
    use chrono::Duration;

    fn context(conversation_id: Uuid) -> GuestContext {
        GuestContext {
            guest_session_id: Uuid::new_v4(),
            guest_number: 1,
            share_link_id: Uuid::new_v4(),
            conversation_id,
            conversation_title: "Transit budget".to_string(),
            conversation_description: None,
            conversation_type: ConversationType::Discussion,
        }
    }

    fn resolved(conversation_id: Uuid) -> ResolvedShareLink {
        ResolvedShareLink {
            share_link_id: Uuid::new_v4(),
            conversation_id,
            expires_at: Utc::now() + Duration::days(7),
            title: "Transit budget".to_string(),
            description: None,
            conversation_type: ConversationType::Discussion,
        }
    }

    #[test]
    fn missing_session_is_reported_before_the_link() {
        // Both are absent; the session stage answers first.
        assert!(matches!(
            decide(None, None),
            Err(GuestAccessError::SessionInvalid)
        ));
    }

    #[test]
    fn missing_link_with_a_valid_session_is_link_not_found() {
        let id = Uuid::new_v4();
        assert!(matches!(
            decide(Some(context(id)), None),
            Err(GuestAccessError::LinkNotFound)
        ));
    }

    #[test]
    fn mismatched_conversations_never_grant_access() {
        let result = decide(Some(context(Uuid::new_v4())), Some(resolved(Uuid::new_v4())));
        assert!(matches!(result, Err(GuestAccessError::ScopeMismatch)));
    }

    #[test]
    fn agreeing_credentials_pass() {
        let id = Uuid::new_v4();
        let access = decide(Some(context(id)), Some(resolved(id))).unwrap();
        assert_eq!(access.conversation_id, id);
        assert_eq!(access.context.conversation_id, id);
    }

    #[test]
    fn wire_codes_and_statuses_line_up() {
        assert_eq!(GuestAccessError::InvalidToken.code(), "INVALID_TOKEN");
        assert_eq!(GuestAccessError::InvalidToken.status(), StatusCode::BAD_REQUEST);
        assert_eq!(GuestAccessError::SessionInvalid.code(), "SESSION_INVALID");
        assert_eq!(GuestAccessError::SessionInvalid.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(GuestAccessError::LinkNotFound.code(), "LINK_NOT_FOUND");
        assert_eq!(GuestAccessError::LinkNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(GuestAccessError::ScopeMismatch.code(), "SCOPE_MISMATCH");
        assert_eq!(GuestAccessError::ScopeMismatch.status(), StatusCode::FORBIDDEN);
    }
}
