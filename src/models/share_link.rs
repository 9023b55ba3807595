use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::conversation::ConversationType;

/// An anonymous, time-boxed access token scoped to one conversation.
///
/// At most one active, unexpired link exists per conversation; the creation
/// path enforces this by reusing the current row rather than through a
/// uniqueness constraint. `is_active` only ever transitions true → false.
#[derive(Debug, Clone, Serialize)]
pub struct ShareLink {
    /// The unique identifier for the link.
    pub id: Uuid,
    /// The conversation this link grants access to.
    pub conversation_id: Uuid,
    /// High-entropy URL token (32 random bytes, base64url without padding).
    pub token: String,
    /// The timestamp when the link expires.
    pub expires_at: DateTime<Utc>,
    /// Cleared by revocation; never set back to true.
    pub is_active: bool,
    /// The user who created the link.
    pub created_by: Uuid,
    /// The timestamp when the link was created.
    pub created_at: DateTime<Utc>,
}

/// A share link resolved for an anonymous caller, joined with the owning
/// conversation's display fields.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedShareLink {
    pub share_link_id: Uuid,
    pub conversation_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub title: String,
    pub description: Option<String>,
    pub conversation_type: ConversationType,
}
