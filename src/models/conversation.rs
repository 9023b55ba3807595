use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};

/// The kind of deliberation a conversation hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSql, FromSql)]
#[postgres(name = "conversation_type")]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    #[postgres(name = "discussion")]
    Discussion,
    #[postgres(name = "poll")]
    Poll,
}
