//! # WhatsApp Webhook Schemas
//!
//! This module contains all data structures for WhatsApp Business API webhooks.
//! These schemas define the JSON payload structure sent by WhatsApp when webhook
//! events occur (incoming messages, status updates, etc.).

use crate::{consts, models, utils};
use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Root webhook payload from WhatsApp
#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookPayload {
    /// The object type, typically "whatsapp_business_account"
    pub object: String,
    /// Array of entry objects containing the actual data
    pub entry: Vec<Entry>,
}

/// Entry object containing changes and metadata
#[derive(Debug, Deserialize, Serialize)]
pub struct Entry {
    /// Business Account ID
    pub id: String,
    /// Array of changes that occurred
    pub changes: Vec<Change>,
}

/// Change object containing the actual webhook data
///
/// `value` is kept untyped: only `messages` changes are interpreted, every
/// other field is stored raw.
#[derive(Debug, Deserialize, Serialize)]
pub struct Change {
    /// The field that changed (e.g., "messages")
    pub field: String,
    pub value: JsonValue,
}

impl Change {
    pub fn is_messages(&self) -> bool {
        self.field == consts::MESSAGES_CHANGE_FIELD
    }
}

/// Value of a `messages` change
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Value {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messaging_product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Array of contacts (senders)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<Contact>>,
    /// Array of messages received
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    /// Array of statuses (for sent messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statuses: Option<Vec<Status>>,
}

/// Metadata about the WhatsApp Business phone number
#[derive(Debug, Deserialize, Serialize)]
pub struct Metadata {
    pub display_phone_number: String,
    pub phone_number_id: String,
}

/// Contact information for the message sender
#[derive(Debug, Deserialize, Serialize)]
pub struct Contact {
    #[serde(default)]
    pub profile: Option<Profile>,
    /// WhatsApp ID (phone number)
    pub wa_id: String,
}

impl Contact {
    pub fn to_sighting(&self, seen_at: DateTime<Utc>) -> models::contact::ContactSighting {
        models::contact::ContactSighting {
            wa_id: self.wa_id.clone(),
            profile_name: self
                .profile
                .as_ref()
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            seen_at,
        }
    }
}

/// Profile information
#[derive(Debug, Deserialize, Serialize)]
pub struct Profile {
    /// Display name of the contact
    pub name: String,
}

/// Message object
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    /// Sender's WhatsApp ID (phone number)
    pub from: String,
    /// Message ID (`wam_id`)
    pub id: String,
    /// Unix timestamp, in seconds, as a string
    pub timestamp: String,
    /// Message type (text, image, video, document, button, etc.)
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<MediaMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<MediaMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<MediaMessage>,
    /// Quick reply button press (if type is "button")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<ButtonMessage>,
    /// Context (if this is a reply to another message)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    /// Everything else the provider sent, kept for the stored payload
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Message {
    pub fn created_at(&self) -> anyhow::Result<DateTime<Utc>> {
        utils::parse_unix_timestamp(&self.timestamp)
            .with_context(|| format!("invalid timestamp on message {}", self.id))
    }

    /// Media attached to image, video and document messages
    pub fn downloadable_media(&self) -> Option<&MediaMessage> {
        match self.msg_type.as_str() {
            "image" => self.image.as_ref(),
            "video" => self.video.as_ref(),
            "document" => self.document.as_ref(),
            _ => None,
        }
    }

    pub fn is_downloadable_media(&self) -> bool {
        consts::DOWNLOADABLE_MEDIA_TYPES.contains(&self.msg_type.as_str())
    }

    /// Builds the row stored for this inbound message
    pub fn to_new_message(&self) -> anyhow::Result<models::message::NewMessage> {
        Ok(models::message::NewMessage {
            wam_id: self.id.clone(),
            chat_id: self.from.clone(),
            msg_type: self.msg_type.clone(),
            payload: serde_json::to_value(self)?,
            is_received: true,
            created_at: self.created_at()?,
            media_url: None,
        })
    }
}

/// Text message content
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TextMessage {
    pub body: String,
}

/// Media message content (image, video, document, audio)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaMessage {
    /// Media ID
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Quick reply button press
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ButtonMessage {
    /// Label of the pressed button
    pub text: String,
    /// Payload attached to the button when the template was sent
    pub payload: String,
}

/// Context for reply messages
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Context {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Message ID being referenced
    pub id: String,
}

/// Status update for sent messages
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Status {
    /// Message ID (`wam_id`)
    pub id: String,
    /// Status (sent, delivered, read, failed)
    pub status: String,
    /// Unix timestamp, in seconds, as a string
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_payload_keeps_provider_fields() {
        let json = r#"{
            "from": "15550001111",
            "id": "wamid.A1",
            "timestamp": "1700000000",
            "type": "reaction",
            "reaction": {"message_id": "wamid.B2", "emoji": "👍"}
        }"#;

        let message: Message = serde_json::from_str(json).unwrap();
        let row = message.to_new_message().unwrap();

        assert_eq!(row.wam_id, "wamid.A1");
        assert_eq!(row.chat_id, "15550001111");
        assert!(row.is_received);
        assert_eq!(row.created_at.timestamp(), 1_700_000_000);
        assert_eq!(row.payload["reaction"]["emoji"], "👍");
        assert_eq!(row.payload["type"], "reaction");
    }

    #[test]
    fn test_downloadable_media_follows_type() {
        let json = r#"{
            "from": "1", "id": "wamid.C3", "timestamp": "1700000000", "type": "image",
            "image": {"id": "media-1", "mime_type": "image/jpeg"}
        }"#;
        let message: Message = serde_json::from_str(json).unwrap();

        assert!(message.is_downloadable_media());
        assert_eq!(message.downloadable_media().unwrap().id, "media-1");
    }

    #[test]
    fn test_invalid_timestamp_is_an_error() {
        let json = r#"{"from": "1", "id": "wamid.D4", "timestamp": "yesterday", "type": "text"}"#;
        let message: Message = serde_json::from_str(json).unwrap();

        assert!(message.to_new_message().is_err());
    }
}
