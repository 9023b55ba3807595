use chrono::{DateTime, Duration, Utc};
use deadpool_postgres::Pool;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::token::generate_token;
use crate::error::Result;
use crate::models::share_link::{ResolvedShareLink, ShareLink};
use crate::repositories::share_link as share_link_repo;

/// The expiry choices offered when creating a share link.
///
/// A closed enumeration: arbitrary durations are not accepted over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkExpiry {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "28d")]
    TwentyEightDays,
}

impl LinkExpiry {
    /// The number of days this choice maps to.
    pub fn days(self) -> i64 {
        match self {
            LinkExpiry::OneDay => 1,
            LinkExpiry::SevenDays => 7,
            LinkExpiry::TwentyEightDays => 28,
        }
    }

    /// Resolves the choice to an absolute expiry.
    pub fn resolve_from(self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.days())
    }
}

/// Creates a share link for a conversation, or returns the active one.
///
/// Idempotent: while an active, unexpired link exists, this never issues a
/// second token for the same conversation. After revocation or expiry the
/// next call mints a fresh token.
///
/// # Arguments
///
/// * `pool` - The database connection pool.
/// * `conversation_id` - The conversation to share.
/// * `created_by` - The owner creating the link.
/// * `expiry` - The chosen lifetime.
///
/// # Returns
///
/// A `Result` containing the active `ShareLink`.
pub async fn create(
    pool: &Pool,
    conversation_id: &Uuid,
    created_by: &Uuid,
    expiry: LinkExpiry,
) -> Result<ShareLink> {
    if let Some(existing) = share_link_repo::find_active(pool, conversation_id).await? {
        tracing::debug!(
            "♻️ Reusing active share link for conversation {}",
            conversation_id
        );
        return Ok(existing);
    }

    let token = generate_token();
    let link = share_link_repo::insert(
        pool,
        Uuid::new_v4(),
        conversation_id,
        &token,
        expiry.resolve_from(Utc::now()),
        created_by,
    )
    .await?;

    tracing::info!("🔗 Share link issued for conversation {}", conversation_id);
    Ok(link)
}

/// Looks up the active link for a conversation, read-only.
///
/// # Arguments
///
/// * `pool` - The database connection pool.
/// * `conversation_id` - The conversation to look up.
///
/// # Returns
///
/// A `Result` containing the active, unexpired `ShareLink`, if any.
pub async fn get(pool: &Pool, conversation_id: &Uuid) -> Result<Option<ShareLink>> {
    share_link_repo::find_active(pool, conversation_id).await
}

/// Revokes the active link(s) for a conversation.
///
/// Idempotent: revoking with nothing active is not an error.
///
/// # Arguments
///
/// * `pool` - The database connection pool.
/// * `conversation_id` - The conversation whose link is revoked.
///
/// # Returns
///
/// A `Result` containing whether any row changed.
pub async fn revoke(pool: &Pool, conversation_id: &Uuid) -> Result<bool> {
    let changed = share_link_repo::revoke(pool, conversation_id).await?;
    if changed > 0 {
        tracing::info!(
            "🚫 Share link revoked for conversation {}",
            conversation_id
        );
    }
    Ok(changed > 0)
}

/// Resolves a token for an anonymous caller.
///
/// Unknown, revoked, and expired tokens all come back as `None`; nothing
/// here may leak *why* a token failed.
///
/// # Arguments
///
/// * `pool` - The database connection pool.
/// * `token` - The share-link token from the URL.
///
/// # Returns
///
/// A `Result` containing the `ResolvedShareLink`, or `None`.
pub async fn resolve(pool: &Pool, token: &str) -> Result<Option<ResolvedShareLink>> {
    share_link_repo::resolve(pool, token).await
}

/// Deletes links whose expiry is older than `retention`, cascading their
/// guest sessions. Recently-expired links are kept so guest numbers stay
/// reserved while any cookie minted under them could still be presented.
///
/// # Arguments
///
/// * `pool` - The database connection pool.
/// * `retention` - How long past expiry a link is kept.
///
/// # Returns
///
/// A `Result` containing the number of links deleted.
pub async fn purge_expired(pool: &Pool, retention: Duration) -> Result<u64> {
    let deleted = share_link_repo::purge_expired(pool, Utc::now() - retention).await?;
    if deleted > 0 {
        tracing::info!("🧹 Purged {} expired share links", deleted);
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn expiry_choices_map_to_days() {
        assert_eq!(LinkExpiry::OneDay.days(), 1);
        assert_eq!(LinkExpiry::SevenDays.days(), 7);
        assert_eq!(LinkExpiry::TwentyEightDays.days(), 28);
    }

    #[test]
    fn seven_days_resolves_to_604800_seconds_out() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let expires = LinkExpiry::SevenDays.resolve_from(now);
        assert_eq!((expires - now).num_seconds(), 604_800);
    }

    #[test]
    fn wire_names_parse_into_the_closed_enum() {
        assert_eq!(
            sonic_rs::from_str::<LinkExpiry>(r#""1d""#).unwrap(),
            LinkExpiry::OneDay
        );
        assert_eq!(
            sonic_rs::from_str::<LinkExpiry>(r#""7d""#).unwrap(),
            LinkExpiry::SevenDays
        );
        assert_eq!(
            sonic_rs::from_str::<LinkExpiry>(r#""28d""#).unwrap(),
            LinkExpiry::TwentyEightDays
        );
        assert!(sonic_rs::from_str::<LinkExpiry>(r#""14d""#).is_err());
        assert!(sonic_rs::from_str::<LinkExpiry>(r#""forever""#).is_err());
    }
}
