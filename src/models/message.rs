use anyhow::bail;
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Delivery state of a message.
///
/// States only move forward, following [`MessageStatus::rank`]. `Failed` is
/// terminal.
#[derive(
    Debug, Display, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, sqlx::Type,
)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    #[display("unsent")]
    Unsent,
    #[display("sent")]
    Sent,
    #[display("delivered")]
    Delivered,
    #[display("read")]
    Read,
    #[display("failed")]
    Failed,
}

impl MessageStatus {
    pub fn rank(&self) -> i64 {
        match self {
            MessageStatus::Unsent => 0,
            MessageStatus::Sent => 1,
            MessageStatus::Delivered => 2,
            MessageStatus::Read => 3,
            MessageStatus::Failed => 4,
        }
    }
}

/// Parses the status values the provider reports in webhook status events.
///
/// `unsent` is an internal state and is rejected like any unknown value.
impl FromStr for MessageStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            "failed" => Ok(MessageStatus::Failed),
            other => bail!("unknown message status: {other}"),
        }
    }
}

/// Message row to insert, inbound or outbound.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub wam_id: String,
    pub chat_id: String,
    pub msg_type: String,
    pub payload: serde_json::Value,
    pub is_received: bool,
    pub created_at: DateTime<Utc>,
    pub media_url: Option<String>,
}

/// A status event accepted by the state machine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusTransition {
    pub wam_id: String,
    pub status: MessageStatus,
    /// Provider event time
    pub at: DateTime<Utc>,
    pub recipient_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoredMessage {
    pub wam_id: String,
    pub chat_id: String,
    pub msg_type: String,
    pub payload: String,
    pub is_received: bool,
    pub media_url: Option<String>,
    pub status: MessageStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_status_parsing() {
        assert_eq!("read".parse::<MessageStatus>().unwrap(), MessageStatus::Read);
        assert_eq!(
            "failed".parse::<MessageStatus>().unwrap(),
            MessageStatus::Failed
        );
        assert!("queued".parse::<MessageStatus>().is_err());
        assert!("unsent".parse::<MessageStatus>().is_err());
    }

    #[test]
    fn test_status_rank_is_forward_only_order() {
        assert!(MessageStatus::Unsent.rank() < MessageStatus::Sent.rank());
        assert!(MessageStatus::Sent.rank() < MessageStatus::Delivered.rank());
        assert!(MessageStatus::Delivered.rank() < MessageStatus::Read.rank());
        assert!(MessageStatus::Read.rank() < MessageStatus::Failed.rank());
    }
}
