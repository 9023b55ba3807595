use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::share_link::{ResolvedShareLink, ShareLink},
};

/// A helper function to map a `tokio_postgres::Row` to a `ShareLink`.
fn row_to_share_link(row: &Row) -> Result<ShareLink> {
    Ok(ShareLink {
        id: row.try_get("id").map_err(|_| AppError::MissingData("id".to_string()))?,
        conversation_id: row.try_get("conversation_id").map_err(|_| AppError::MissingData("conversation_id".to_string()))?,
        token: row.try_get("token").map_err(|_| AppError::MissingData("token".to_string()))?,
        expires_at: row.try_get("expires_at").map_err(|_| AppError::MissingData("expires_at".to_string()))?,
        is_active: row.try_get("is_active").map_err(|_| AppError::MissingData("is_active".to_string()))?,
        created_by: row.try_get("created_by").map_err(|_| AppError::MissingData("created_by".to_string()))?,
        created_at: row.try_get("created_at").map_err(|_| AppError::MissingData("created_at".to_string()))?,
    })
}

/// A helper function to map a joined row to a `ResolvedShareLink`.
fn row_to_resolved(row: &Row) -> Result<ResolvedShareLink> {
    Ok(ResolvedShareLink {
        share_link_id: row.try_get("share_link_id").map_err(|_| AppError::MissingData("share_link_id".to_string()))?,
        conversation_id: row.try_get("conversation_id").map_err(|_| AppError::MissingData("conversation_id".to_string()))?,
        expires_at: row.try_get("expires_at").map_err(|_| AppError::MissingData("expires_at".to_string()))?,
        title: row.try_get("title").map_err(|_| AppError::MissingData("title".to_string()))?,
        description: row.try_get("description").map_err(|_| AppError::MissingData("description".to_string()))?,
        conversation_type: row.try_get("conversation_type").map_err(|_| AppError::MissingData("conversation_type".to_string()))?,
    })
}

/// Finds the currently active, unexpired link for a conversation.
pub async fn find_active(pool: &Pool, conversation_id: &Uuid) -> Result<Option<ShareLink>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT id, conversation_id, token, expires_at, is_active, created_by, created_at
            FROM share_links
            WHERE conversation_id = $1 AND is_active = TRUE AND expires_at > NOW()
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            &[conversation_id],
        )
        .await?;
    row.map(|r| row_to_share_link(&r)).transpose()
}

/// Inserts a fresh share link row.
pub async fn insert(
    pool: &Pool,
    id: Uuid,
    conversation_id: &Uuid,
    token: &str,
    expires_at: DateTime<Utc>,
    created_by: &Uuid,
) -> Result<ShareLink> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            r#"
            INSERT INTO share_links (id, conversation_id, token, expires_at, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, conversation_id, token, expires_at, is_active, created_by, created_at
            "#,
            &[&id, conversation_id, &token, &expires_at, created_by],
        )
        .await?;
    row_to_share_link(&row)
}

/// Deactivates the active row(s) for a conversation; returns how many
/// rows changed. Revoking with nothing active is not an error.
pub async fn revoke(pool: &Pool, conversation_id: &Uuid) -> Result<u64> {
    let client = pool.get().await?;
    let changed = client
        .execute(
            r#"
            UPDATE share_links
            SET is_active = FALSE
            WHERE conversation_id = $1 AND is_active = TRUE
            "#,
            &[conversation_id],
        )
        .await?;
    Ok(changed)
}

/// Resolves a token for an anonymous caller, joined with the conversation's
/// display fields. Unknown, revoked, and expired tokens are
/// indistinguishable here.
pub async fn resolve(pool: &Pool, token: &str) -> Result<Option<ResolvedShareLink>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT sl.id AS share_link_id, sl.conversation_id, sl.expires_at,
                   c.title, c.description, c.conversation_type
            FROM share_links sl
            JOIN conversations c ON c.id = sl.conversation_id
            WHERE sl.token = $1 AND sl.is_active = TRUE AND sl.expires_at > NOW()
            "#,
            &[&token],
        )
        .await?;
    row.map(|r| row_to_resolved(&r)).transpose()
}

/// Deletes links that expired before `cutoff`. Their guest sessions cascade
/// away with them; per-link numbering is unaffected because a deleted
/// link's id never returns.
pub async fn purge_expired(pool: &Pool, cutoff: DateTime<Utc>) -> Result<u64> {
    let client = pool.get().await?;
    let deleted = client
        .execute(
            r#"
            DELETE FROM share_links
            WHERE expires_at < $1
            "#,
            &[&cutoff],
        )
        .await?;
    Ok(deleted)
}
