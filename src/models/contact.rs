use chrono::{DateTime, Utc};
use serde::Serialize;

/// A contact seen in an inbound webhook, written with upsert semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactSighting {
    pub wa_id: String,
    pub profile_name: String,
    pub seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Contact {
    pub wa_id: String,
    pub profile_name: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_received_at: Option<DateTime<Utc>>,
    pub in_chat: bool,
    pub unread_count: i64,
    pub last_read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
