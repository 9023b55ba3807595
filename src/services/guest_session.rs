use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use uuid::Uuid;

use crate::crypto::token::{generate_token, hash_token};
use crate::error::Result;
use crate::models::guest_session::{GuestContext, GuestSession, GuestSessionJoined};
use crate::repositories::guest_session as guest_session_repo;

/// Cookie carrying the raw guest session token.
pub const GUEST_SESSION_COOKIE: &str = "guest_session";

/// The stage at which a stored guest session failed validation.
///
/// Internal only; anonymous callers see every stage as the same `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeFailure {
    /// The guest session's own expiry has passed.
    SessionExpired,
    /// The parent share link was revoked.
    LinkRevoked,
    /// The parent share link's expiry has passed.
    LinkExpired,
}

impl CascadeFailure {
    fn reason(self) -> &'static str {
        match self {
            CascadeFailure::SessionExpired => "session expired",
            CascadeFailure::LinkRevoked => "link revoked",
            CascadeFailure::LinkExpired => "link expired",
        }
    }
}

/// Runs the validity cascade over a stored guest session.
///
/// A guest session can outlive a revoked or expired link in storage; it must
/// never validate as usable once its parent is invalid. Stages run in order
/// and the first failure wins.
pub fn check_cascade(
    joined: &GuestSessionJoined,
    now: DateTime<Utc>,
) -> std::result::Result<(), CascadeFailure> {
    if joined.session_expires_at <= now {
        return Err(CascadeFailure::SessionExpired);
    }
    if !joined.link_is_active {
        return Err(CascadeFailure::LinkRevoked);
    }
    if joined.link_expires_at <= now {
        return Err(CascadeFailure::LinkExpired);
    }
    Ok(())
}

/// A freshly minted guest session together with the raw token.
///
/// The raw token goes into the guest's cookie and is never seen again; the
/// row stores only its hash.
pub struct IssuedGuestSession {
    pub session: GuestSession,
    pub raw_token: String,
}

/// Mints a guest session under a share link.
///
/// The sequential guest number is assigned by the insert itself; see
/// `repositories::guest_session::insert_next`.
///
/// # Arguments
///
/// * `pool` - The database connection pool.
/// * `share_link_id` - The link the session is minted under.
/// * `expires_at` - When the session expires.
///
/// # Returns
///
/// A `Result` containing the `IssuedGuestSession` with its raw token.
pub async fn create(
    pool: &Pool,
    share_link_id: &Uuid,
    expires_at: DateTime<Utc>,
) -> Result<IssuedGuestSession> {
    let raw_token = generate_token();
    let session = guest_session_repo::insert_next(
        pool,
        Uuid::new_v4(),
        share_link_id,
        &hash_token(&raw_token),
        expires_at,
    )
    .await?;

    tracing::info!(
        "👤 Guest {} joined via link {}",
        session.guest_number,
        share_link_id
    );
    Ok(IssuedGuestSession { session, raw_token })
}

/// Validates a raw guest cookie token.
///
/// Hashes the token, fetches the joined row, and runs the cascade. Every
/// failure mode collapses to `None` for the caller.
///
/// # Arguments
///
/// * `pool` - The database connection pool.
/// * `raw_token` - The raw token from the guest's cookie, if present.
/// * `now` - The validation instant.
///
/// # Returns
///
/// A `Result` containing the `GuestContext`, or `None`.
pub async fn validate(
    pool: &Pool,
    raw_token: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<GuestContext>> {
    let Some(raw) = raw_token else {
        return Ok(None);
    };

    let Some(joined) = guest_session_repo::find_by_token_hash(pool, &hash_token(raw)).await? else {
        return Ok(None);
    };

    match check_cascade(&joined, now) {
        Ok(()) => Ok(Some(joined.into_context())),
        Err(stage) => {
            tracing::debug!("🚫 Guest session rejected: {}", stage.reason());
            Ok(None)
        }
    }
}

/// Seconds until `expires_at`, clamped at zero for cookie max-age.
pub fn cookie_max_age_secs(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expires_at - now).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::conversation::ConversationType;
    use chrono::Duration;

    fn joined(
        session_expires_at: DateTime<Utc>,
        link_is_active: bool,
        link_expires_at: DateTime<Utc>,
    ) -> GuestSessionJoined {
        GuestSessionJoined {
            guest_session_id: Uuid::new_v4(),
            guest_number: 3,
            session_expires_at,
            share_link_id: Uuid::new_v4(),
            link_is_active,
            link_expires_at,
            conversation_id: Uuid::new_v4(),
            conversation_title: "Budget deliberation".to_string(),
            conversation_description: None,
            conversation_type: ConversationType::Discussion,
        }
    }

    #[test]
    fn a_live_session_under_a_live_link_passes() {
        let now = Utc::now();
        let row = joined(now + Duration::hours(1), true, now + Duration::days(6));
        assert_eq!(check_cascade(&row, now), Ok(()));
    }

    #[test]
    fn an_expired_session_fails_first() {
        let now = Utc::now();
        // Link problems too, but the session stage reports before them.
        let row = joined(now - Duration::seconds(1), false, now - Duration::days(1));
        assert_eq!(check_cascade(&row, now), Err(CascadeFailure::SessionExpired));
    }

    #[test]
    fn a_revoked_link_fails_a_still_live_session() {
        let now = Utc::now();
        let row = joined(now + Duration::days(1), false, now + Duration::days(1));
        assert_eq!(check_cascade(&row, now), Err(CascadeFailure::LinkRevoked));
    }

    #[test]
    fn an_expired_link_fails_a_still_live_session() {
        let now = Utc::now();
        let row = joined(now + Duration::days(1), true, now - Duration::seconds(1));
        assert_eq!(check_cascade(&row, now), Err(CascadeFailure::LinkExpired));
    }

    #[test]
    fn expiry_boundaries_are_exclusive_of_now() {
        let now = Utc::now();
        assert_eq!(
            check_cascade(&joined(now, true, now + Duration::days(1)), now),
            Err(CascadeFailure::SessionExpired)
        );
        assert_eq!(
            check_cascade(&joined(now + Duration::days(1), true, now), now),
            Err(CascadeFailure::LinkExpired)
        );
    }

    #[test]
    fn cookie_max_age_counts_down_to_expiry() {
        let now = Utc::now();
        assert_eq!(
            cookie_max_age_secs(now + Duration::days(7), now),
            604_800
        );
        assert_eq!(cookie_max_age_secs(now + Duration::seconds(90), now), 90);
    }

    #[test]
    fn cookie_max_age_clamps_at_zero() {
        let now = Utc::now();
        assert_eq!(cookie_max_age_secs(now - Duration::hours(2), now), 0);
        assert_eq!(cookie_max_age_secs(now, now), 0);
    }
}
