use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::conversation::ConversationType;

/// A per-visitor ephemeral identity layered on a share link.
///
/// ⚠️ IMPORTANT: the raw session token exists only in the guest's browser
/// cookie. This row stores its hex-encoded SHA-256 and nothing reversible.
/// `guest_number` is assigned once as the current per-link maximum plus one
/// and is never reused, even after earlier sessions expire.
#[derive(Debug, Clone)]
pub struct GuestSession {
    /// The unique identifier for the guest session.
    pub id: Uuid,
    /// The share link this session was minted under.
    pub share_link_id: Uuid,
    /// Sequential display number within the share link ("Guest 3").
    pub guest_number: i32,
    /// Hex-encoded SHA-256 of the raw cookie token.
    pub session_token_hash: String,
    /// The timestamp when the session expires.
    pub expires_at: DateTime<Utc>,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
}

/// A guest session joined through its share link to the conversation,
/// fetched in one query so the validation cascade can inspect every stage.
#[derive(Debug, Clone)]
pub struct GuestSessionJoined {
    pub guest_session_id: Uuid,
    pub guest_number: i32,
    pub session_expires_at: DateTime<Utc>,
    pub share_link_id: Uuid,
    pub link_is_active: bool,
    pub link_expires_at: DateTime<Utc>,
    pub conversation_id: Uuid,
    pub conversation_title: String,
    pub conversation_description: Option<String>,
    pub conversation_type: ConversationType,
}

/// The flattened view handed to request handlers once the cascade passes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuestContext {
    pub guest_session_id: Uuid,
    pub guest_number: i32,
    pub share_link_id: Uuid,
    pub conversation_id: Uuid,
    pub conversation_title: String,
    pub conversation_description: Option<String>,
    pub conversation_type: ConversationType,
}

impl GuestSessionJoined {
    /// Flattens the joined row once every cascade stage has passed.
    pub fn into_context(self) -> GuestContext {
        GuestContext {
            guest_session_id: self.guest_session_id,
            guest_number: self.guest_number,
            share_link_id: self.share_link_id,
            conversation_id: self.conversation_id,
            conversation_title: self.conversation_title,
            conversation_description: self.conversation_description,
            conversation_type: self.conversation_type,
        }
    }
}
