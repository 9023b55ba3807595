use deadpool_postgres::Pool;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Finds the owner of a conversation, if the conversation exists.
pub async fn find_owner(pool: &Pool, conversation_id: &Uuid) -> Result<Option<Uuid>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT owner_id
            FROM conversations
            WHERE id = $1
            "#,
            &[conversation_id],
        )
        .await?;
    row.map(|r| {
        r.try_get("owner_id")
            .map_err(|_| AppError::MissingData("owner_id".to_string()))
    })
    .transpose()
}
