//! # WhatsApp Outgoing Message Schemas
//!
//! This module contains data structures for sending messages to WhatsApp Business API.
//! These schemas define the JSON payload structure for various message types.

use crate::{consts, models::template::TemplateRequest};
use serde::{Deserialize, Serialize};

/// Message to send to WhatsApp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Messaging product, always "whatsapp"
    pub messaging_product: String,
    pub recipient_type: String,
    /// Recipient's WhatsApp ID (phone number)
    pub to: String,
    #[serde(flatten)]
    pub content: OutgoingContent,
}

/// Typed body of the outgoing message, serialized as `"type": ...` plus the
/// object named after it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutgoingContent {
    Text { text: OutgoingTextContent },
    Image { image: MediaContent },
    Video { video: MediaContent },
    Document { document: MediaContent },
    Template { template: TemplateRequest },
}

impl OutgoingContent {
    /// Value of the `type` field
    pub fn msg_type(&self) -> &'static str {
        match self {
            OutgoingContent::Text { .. } => "text",
            OutgoingContent::Image { .. } => "image",
            OutgoingContent::Video { .. } => "video",
            OutgoingContent::Document { .. } => "document",
            OutgoingContent::Template { .. } => "template",
        }
    }
}

impl OutgoingMessage {
    fn new(to: String, content: OutgoingContent) -> Self {
        Self {
            messaging_product: consts::MESSAGING_PRODUCT.to_string(),
            recipient_type: "individual".to_string(),
            to,
            content,
        }
    }

    /// Creates a new text message
    pub fn new_text(to: String, body: String) -> Self {
        Self::new(
            to,
            OutgoingContent::Text {
                text: OutgoingTextContent {
                    preview_url: false,
                    body,
                },
            },
        )
    }

    pub fn new_template(to: String, template: TemplateRequest) -> Self {
        Self::new(to, OutgoingContent::Template { template })
    }

    pub fn new_media(to: String, content: OutgoingContent) -> Self {
        Self::new(to, content)
    }
}

/// Text content for outgoing messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingTextContent {
    #[serde(default)]
    pub preview_url: bool,
    /// Message body text
    pub body: String,
}

/// Image, video or document content
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaContent {
    /// Media ID returned by the upload endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Only meaningful for documents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Response from WhatsApp API when sending a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatsAppMessageResponse {
    /// Messaging product
    pub messaging_product: String,
    /// Array of contacts (recipients)
    #[serde(default)]
    pub contacts: Vec<WhatsAppContact>,
    /// Array of messages sent
    pub messages: Vec<WhatsAppMessageStatus>,
}

impl WhatsAppMessageResponse {
    /// Id of the first accepted message, the `wam_id` to store
    pub fn wam_id(&self) -> Option<&str> {
        self.messages.first().map(|m| m.id.as_str())
    }
}

/// Contact information in response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatsAppContact {
    /// WhatsApp ID of the contact
    pub wa_id: String,
    /// Input phone number
    pub input: String,
}

/// Message status in response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatsAppMessageStatus {
    /// Message ID
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_message_shape() {
        let message = OutgoingMessage::new_media(
            "15550001111".to_string(),
            OutgoingContent::Document {
                document: MediaContent {
                    id: Some("media-9".to_string()),
                    caption: Some("invoice".to_string()),
                    filename: Some("invoice.pdf".to_string()),
                    ..Default::default()
                },
            },
        );

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": "15550001111",
                "type": "document",
                "document": {"id": "media-9", "caption": "invoice", "filename": "invoice.pdf"}
            })
        );
    }

    #[test]
    fn test_response_wam_id() {
        let response: WhatsAppMessageResponse = serde_json::from_value(json!({
            "messaging_product": "whatsapp",
            "contacts": [{"input": "15550001111", "wa_id": "15550001111"}],
            "messages": [{"id": "wamid.OUT1"}]
        }))
        .unwrap();

        assert_eq!(response.wam_id(), Some("wamid.OUT1"));
    }
}
