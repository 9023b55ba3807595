use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use tokio_postgres::error::SqlState;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::guest_session::{GuestSession, GuestSessionJoined},
};

/// Attempts before giving up on a guest-number conflict. Conflicts only
/// occur when several guests join the same link in the same instant.
const NUMBERING_MAX_ATTEMPTS: usize = 5;

/// A helper function to map a `tokio_postgres::Row` to a `GuestSession`.
fn row_to_guest_session(row: &Row) -> Result<GuestSession> {
    Ok(GuestSession {
        id: row.try_get("id").map_err(|_| AppError::MissingData("id".to_string()))?,
        share_link_id: row.try_get("share_link_id").map_err(|_| AppError::MissingData("share_link_id".to_string()))?,
        guest_number: row.try_get("guest_number").map_err(|_| AppError::MissingData("guest_number".to_string()))?,
        session_token_hash: row.try_get("session_token_hash").map_err(|_| AppError::MissingData("session_token_hash".to_string()))?,
        expires_at: row.try_get("expires_at").map_err(|_| AppError::MissingData("expires_at".to_string()))?,
        created_at: row.try_get("created_at").map_err(|_| AppError::MissingData("created_at".to_string()))?,
    })
}

/// A helper function to map a joined row to a `GuestSessionJoined`.
fn row_to_joined(row: &Row) -> Result<GuestSessionJoined> {
    Ok(GuestSessionJoined {
        guest_session_id: row.try_get("guest_session_id").map_err(|_| AppError::MissingData("guest_session_id".to_string()))?,
        guest_number: row.try_get("guest_number").map_err(|_| AppError::MissingData("guest_number".to_string()))?,
        session_expires_at: row.try_get("session_expires_at").map_err(|_| AppError::MissingData("session_expires_at".to_string()))?,
        share_link_id: row.try_get("share_link_id").map_err(|_| AppError::MissingData("share_link_id".to_string()))?,
        link_is_active: row.try_get("link_is_active").map_err(|_| AppError::MissingData("link_is_active".to_string()))?,
        link_expires_at: row.try_get("link_expires_at").map_err(|_| AppError::MissingData("link_expires_at".to_string()))?,
        conversation_id: row.try_get("conversation_id").map_err(|_| AppError::MissingData("conversation_id".to_string()))?,
        conversation_title: row.try_get("conversation_title").map_err(|_| AppError::MissingData("conversation_title".to_string()))?,
        conversation_description: row.try_get("conversation_description").map_err(|_| AppError::MissingData("conversation_description".to_string()))?,
        conversation_type: row.try_get("conversation_type").map_err(|_| AppError::MissingData("conversation_type".to_string()))?,
    })
}

/// Inserts a guest session with the next sequential number for its link.
///
/// The number is computed inside the insert itself and serialized by the
/// `UNIQUE (share_link_id, guest_number)` constraint: when two guests race,
/// the loser retries against the updated maximum. Expired rows keep their
/// slot for as long as the link exists, so numbers are never reused.
pub async fn insert_next(
    pool: &Pool,
    id: Uuid,
    share_link_id: &Uuid,
    session_token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<GuestSession> {
    let client = pool.get().await?;

    for attempt in 1..=NUMBERING_MAX_ATTEMPTS {
        let result = client
            .query_one(
                r#"
                INSERT INTO guest_sessions (id, share_link_id, guest_number, session_token_hash, expires_at)
                SELECT $1, $2, COALESCE(MAX(guest_number), 0) + 1, $3, $4
                FROM guest_sessions
                WHERE share_link_id = $2
                RETURNING id, share_link_id, guest_number, session_token_hash, expires_at, created_at
                "#,
                &[&id, share_link_id, &session_token_hash, &expires_at],
            )
            .await;

        match result {
            Ok(row) => return row_to_guest_session(&row),
            Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                tracing::debug!(
                    "🔁 Guest number conflict on link {} (attempt {}), retrying",
                    share_link_id,
                    attempt
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(AppError::Internal(
        "guest numbering did not converge".to_string(),
    ))
}

/// Fetches a guest session by token hash, joined through its share link to
/// the conversation. No validity filtering happens here; the cascade in the
/// service layer decides, stage by stage.
pub async fn find_by_token_hash(pool: &Pool, token_hash: &str) -> Result<Option<GuestSessionJoined>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT gs.id AS guest_session_id, gs.guest_number,
                   gs.expires_at AS session_expires_at,
                   sl.id AS share_link_id, sl.is_active AS link_is_active,
                   sl.expires_at AS link_expires_at,
                   c.id AS conversation_id, c.title AS conversation_title,
                   c.description AS conversation_description, c.conversation_type
            FROM guest_sessions gs
            JOIN share_links sl ON sl.id = gs.share_link_id
            JOIN conversations c ON c.id = sl.conversation_id
            WHERE gs.session_token_hash = $1
            "#,
            &[&token_hash],
        )
        .await?;
    row.map(|r| row_to_joined(&r)).transpose()
}
