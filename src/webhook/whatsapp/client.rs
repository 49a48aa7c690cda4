//! # WhatsApp API Client
//!
//! This module provides a client for the WhatsApp Business (Graph) API.
//! It handles authentication, message sending, media upload and media download.

use super::outgoing_schemas::{OutgoingMessage, WhatsAppMessageResponse};
use crate::{config, utils};
use async_trait::async_trait;
use derive_more::{Display, Error};

/// Failure talking to the provider
#[derive(Debug, Display, Error)]
pub enum ClientError {
    /// Non-2xx answer, body kept verbatim
    #[display("WhatsApp API returned error status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[display("WhatsApp API request timed out")]
    Timeout,
    #[display("WhatsApp API request failed: {_0}")]
    Transport(#[error(not(source))] String),
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return ClientError::Timeout;
        }
        ClientError::Transport(error.to_string())
    }
}

/// Response from WhatsApp media upload API
#[derive(Debug, serde::Deserialize)]
pub struct MediaUploadResponse {
    /// Uploaded media ID
    pub id: String,
}

/// Response from the media url lookup
#[derive(Debug, serde::Deserialize)]
pub struct MediaUrlResponse {
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Media bytes downloaded from the provider
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedMedia {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Operations of the provider API used by the inbox
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WhatsAppApi: Send + Sync {
    async fn send_message(
        &self,
        message: &OutgoingMessage,
    ) -> Result<WhatsAppMessageResponse, ClientError>;

    /// Uploads media and returns the provider media id
    async fn upload_media(
        &self,
        file_bytes: Vec<u8>,
        mime_type: &str,
        filename: &str,
    ) -> Result<String, ClientError>;

    /// Resolves a media id to its temporary url and downloads it
    async fn download_media(&self, media_id: &str) -> Result<DownloadedMedia, ClientError>;
}

/// WhatsApp API client for sending messages and uploading media
pub struct WhatsAppClient {
    /// HTTP client for making API requests, bounded by a timeout
    client: reqwest::Client,
    /// Versioned Graph API base url
    graph_base_url: String,
    /// WhatsApp Business API endpoint for sending messages
    messages_endpoint: String,
    /// WhatsApp Business API endpoint for uploading media
    media_endpoint: String,
    /// Authentication token
    auth_token: String,
}

impl WhatsAppClient {
    /// Creates a new WhatsApp client
    pub fn new(app_config: &config::AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: utils::build_http_client(app_config.http_timeout())?,
            graph_base_url: app_config.graph_api_base_url(),
            messages_endpoint: app_config.whatsapp_send_msg_endpoint(),
            media_endpoint: app_config.whatsapp_upload_media_endpoint(),
            auth_token: app_config.whatsapp_business_auth.clone(),
        })
    }

    /// Turns a non-success response into [`ClientError::Upstream`]
    async fn error_from_response(response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());

        ClientError::Upstream { status, body }
    }
}

#[async_trait]
impl WhatsAppApi for WhatsAppClient {
    async fn send_message(
        &self,
        message: &OutgoingMessage,
    ) -> Result<WhatsAppMessageResponse, ClientError> {
        let response = self
            .client
            .post(&self.messages_endpoint)
            .bearer_auth(&self.auth_token)
            .header("Content-Type", "application/json")
            .json(message)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        Ok(response.json::<WhatsAppMessageResponse>().await?)
    }

    async fn upload_media(
        &self,
        file_bytes: Vec<u8>,
        mime_type: &str,
        filename: &str,
    ) -> Result<String, ClientError> {
        let file_part = reqwest::multipart::Part::bytes(file_bytes)
            .file_name(filename.to_string())
            .mime_str(mime_type)?;

        let form = reqwest::multipart::Form::new()
            .text("messaging_product", "whatsapp")
            .text("type", mime_type.to_string())
            .part("file", file_part);

        let response = self
            .client
            .post(&self.media_endpoint)
            .bearer_auth(&self.auth_token)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let upload_response: MediaUploadResponse = response.json().await?;

        Ok(upload_response.id)
    }

    async fn download_media(&self, media_id: &str) -> Result<DownloadedMedia, ClientError> {
        let response = self
            .client
            .get(format!("{}/{}", self.graph_base_url, media_id))
            .bearer_auth(&self.auth_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let media_url: MediaUrlResponse = response.json().await?;

        let response = self
            .client
            .get(&media_url.url)
            .bearer_auth(&self.auth_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let mime_type = media_url
            .mime_type
            .or_else(|| {
                response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        Ok(DownloadedMedia {
            bytes: response.bytes().await?.to_vec(),
            mime_type,
        })
    }
}
