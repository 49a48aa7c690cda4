//! # Outbound Messages
//!
//! Sends text, media and template messages to a contact through the provider
//! API and records what was sent. A template is sent with its raw variables
//! while the stored copy carries the rendered components, so the inbox can
//! show the text the contact actually received.

use crate::{
    api, consts, metric,
    models::{self, template::TemplateRequest},
    repo, services, utils,
    webhook::whatsapp::{
        client::{self, ClientError},
        outgoing_schemas::{MediaContent, OutgoingContent, OutgoingMessage},
    },
};
use chrono::Utc;
use derive_more::{Display, Error};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Video,
    /// Sent as a document
    File,
}

impl FileKind {
    /// Maps the `fileType` form field. Anything but image/video goes out as a document.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(str::trim) {
            Some("image") => FileKind::Image,
            Some("video") => FileKind::Video,
            _ => FileKind::File,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundFile {
    pub kind: FileKind,
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendMessageRequest {
    pub to: String,
    pub message: Option<String>,
    pub file: Option<OutboundFile>,
    pub template: Option<TemplateRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentMessage {
    pub wam_id: String,
    pub chat_id: String,
    pub media_url: Option<String>,
}

#[derive(Debug, Display, Error)]
pub enum SendError {
    #[display("{_0}")]
    Validation(#[error(not(source))] String),
    /// Provider rejection or timeout, body kept verbatim
    #[display("WhatsApp API error {status}: {body}")]
    Upstream { status: u16, body: String },
    #[display("{_0}")]
    Internal(#[error(not(source))] String),
}

impl From<ClientError> for SendError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Upstream { status, body } => SendError::Upstream { status, body },
            ClientError::Timeout => SendError::Upstream {
                status: 504,
                body: "WhatsApp API request timed out".to_string(),
            },
            ClientError::Transport(reason) => SendError::Upstream { status: 502, body: reason },
        }
    }
}

#[derive(Clone)]
pub struct OutboundSender {
    pub client: Arc<dyn client::WhatsAppApi>,
    pub repo: repo::ImplAppRepo,
    pub storage: services::ImplStorageService,
}

impl OutboundSender {
    pub async fn send(&self, request: SendMessageRequest) -> Result<SentMessage, SendError> {
        validate(&request)?;

        let SendMessageRequest {
            to,
            message,
            file,
            template,
        } = request;
        let caption = message.filter(|m| !m.trim().is_empty());

        let (outgoing, media_url) = match (file, template) {
            (Some(file), _) => {
                let (content, media_url) = self.upload_file(&to, file, caption).await?;
                (OutgoingMessage::new_media(to.clone(), content), Some(media_url))
            }
            (None, Some(template)) => (OutgoingMessage::new_template(to.clone(), template), None),
            (None, None) => (
                OutgoingMessage::new_text(to.clone(), caption.unwrap_or_default()),
                None,
            ),
        };

        let response = self.client.send_message(&outgoing).await?;

        let wam_id = response
            .wam_id()
            .ok_or_else(|| SendError::Internal("provider response has no message id".to_string()))?
            .to_string();
        let chat_id = response
            .contacts
            .first()
            .map(|contact| contact.wa_id.clone())
            .unwrap_or_else(|| to.clone());

        metric::incr_outbound_message_statds(outgoing.content.msg_type());

        self.record(&outgoing, &wam_id, &chat_id, media_url.clone())
            .await;

        Ok(SentMessage {
            wam_id,
            chat_id,
            media_url,
        })
    }

    /// Uploads the file to the provider and keeps a copy at `{to}/{media_id}.{ext}`
    async fn upload_file(
        &self,
        to: &str,
        file: OutboundFile,
        caption: Option<String>,
    ) -> Result<(OutgoingContent, String), SendError> {
        let media_id = self
            .client
            .upload_media(file.bytes.clone(), &file.mime_type, &file.filename)
            .await?;

        let extension = utils::file_extension(&file.filename)
            .unwrap_or_else(|| utils::extension_from_mime(&file.mime_type));
        let path = format!("{to}/{media_id}.{extension}");

        let media_url = self
            .storage
            .save_media(&path, file.bytes, &file.mime_type)
            .await
            .map_err(|e| SendError::Internal(format!("failed to store media: {e}")))?;

        let media = MediaContent {
            id: Some(media_id),
            caption,
            ..Default::default()
        };

        let content = match file.kind {
            FileKind::Image => OutgoingContent::Image { image: media },
            FileKind::Video => OutgoingContent::Video { video: media },
            FileKind::File => OutgoingContent::Document {
                document: MediaContent {
                    filename: Some(file.filename),
                    ..media
                },
            },
        };

        Ok((content, media_url))
    }

    /// Persists the sent message and touches the contact.
    /// The message is already out, so failures here are only logged.
    async fn record(
        &self,
        outgoing: &OutgoingMessage,
        wam_id: &str,
        chat_id: &str,
        media_url: Option<String>,
    ) {
        let payload = self.stored_payload(outgoing, wam_id).await;

        let now = Utc::now();
        let new_message = models::message::NewMessage {
            wam_id: wam_id.to_string(),
            chat_id: chat_id.to_string(),
            msg_type: outgoing.content.msg_type().to_string(),
            payload,
            is_received: false,
            created_at: now,
            media_url,
        };

        if let Err(e) = self.repo.insert_messages(&[new_message]).await {
            logfire::error!(
                "failed to store outbound message {wam_id}: {error}",
                wam_id = wam_id.to_string(),
                error = e.to_string()
            );
        }

        if let Err(e) = self.repo.touch_contact_last_message(&outgoing.to, now).await {
            logfire::error!(
                "failed to update last message of {wa_id}: {error}",
                wa_id = outgoing.to.clone(),
                error = e.to_string()
            );
        }
    }

    /// Outgoing payload without `messaging_product`, with the provider id and,
    /// for templates, the rendered components. Falls back to the raw variables
    /// when the template can't be rendered.
    async fn stored_payload(&self, outgoing: &OutgoingMessage, wam_id: &str) -> serde_json::Value {
        let mut payload = serde_json::to_value(outgoing)
            .unwrap_or_else(|_| serde_json::json!({"to": outgoing.to}));

        if let Some(map) = payload.as_object_mut() {
            map.remove("messaging_product");
            map.insert("id".to_string(), serde_json::Value::String(wam_id.to_string()));
        }

        if let OutgoingContent::Template { template } = &outgoing.content {
            match self.rendered_components(template).await {
                Ok(Some(components)) => payload["template"]["components"] = components,
                Ok(None) => {
                    logfire::warn!(
                        "template {name}/{language} is not stored, keeping raw variables",
                        name = template.name.clone(),
                        language = template.language.code.clone()
                    );
                }
                Err(e) => {
                    logfire::error!(
                        "failed to render template {name} of {wam_id}, keeping raw variables: {error}",
                        name = template.name.clone(),
                        wam_id = wam_id.to_string(),
                        error = format!("{e:#}")
                    );
                }
            }
        }

        payload
    }

    async fn rendered_components(
        &self,
        template: &TemplateRequest,
    ) -> anyhow::Result<Option<serde_json::Value>> {
        let Some(definition) = self
            .repo
            .get_message_template(&template.name, &template.language.code)
            .await?
        else {
            return Ok(None);
        };

        let rendered = api::template::render_components(&definition.components, &template.components);
        Ok(Some(serde_json::to_value(rendered)?))
    }
}

fn validate(request: &SendMessageRequest) -> Result<(), SendError> {
    if request.to.trim().is_empty() {
        return Err(SendError::Validation("`to` is required".to_string()));
    }

    let has_text = request
        .message
        .as_deref()
        .is_some_and(|m| !m.trim().is_empty());

    if !has_text && request.file.is_none() && request.template.is_none() {
        return Err(SendError::Validation(
            "one of `message`, `file` or `template` is required".to_string(),
        ));
    }

    if let Some(file) = &request.file {
        if file.bytes.is_empty() {
            return Err(SendError::Validation("`file` is empty".to_string()));
        }
        if file.bytes.len() > consts::OUTBOUND_FILE_MAX_SIZE_BYTES {
            return Err(SendError::Validation(format!(
                "`file` is larger than {} bytes",
                consts::OUTBOUND_FILE_MAX_SIZE_BYTES
            )));
        }
    }

    Ok(())
}
