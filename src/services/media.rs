use crate::{repo, services, utils, webhook::whatsapp::client, webhook::whatsapp::schemas};
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use std::sync::Arc;

/// Copies inbound media from the provider into object storage
#[derive(Clone)]
pub struct MediaHandler {
    pub client: Arc<dyn client::WhatsAppApi>,
    pub storage: services::ImplStorageService,
    pub repo: repo::ImplAppRepo,
}

/// Storage key of an inbound media: `{chat_id}/{wam_id}.{ext}`
fn media_path(message: &schemas::Message, media: &schemas::MediaMessage, mime_type: &str) -> String {
    let extension = media
        .filename
        .as_deref()
        .and_then(utils::file_extension)
        .unwrap_or_else(|| utils::extension_from_mime(mime_type));

    format!("{}/{}.{}", message.from, message.id, extension)
}

#[async_trait]
impl services::MediaService for MediaHandler {
    async fn download_media(&self, message: &schemas::Message) -> anyhow::Result<()> {
        let media = message
            .downloadable_media()
            .ok_or_else(|| anyhow!("message {} has no downloadable media", message.id))?;

        let downloaded = self
            .client
            .download_media(&media.id)
            .await
            .with_context(|| format!("failed to download media {}", media.id))?;

        let mime_type = media
            .mime_type
            .clone()
            .unwrap_or_else(|| downloaded.mime_type.clone());
        let path = media_path(message, media, &mime_type);

        let stored_path = self
            .storage
            .save_media(&path, downloaded.bytes, &mime_type)
            .await
            .with_context(|| format!("failed to store media at {path}"))?;

        self.repo
            .set_message_media_url(&message.id, &stored_path)
            .await?;

        logfire::debug!(
            "stored media of {wam_id} at {path}",
            wam_id = message.id.clone(),
            path = stored_path
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        repo::MockAppRepo,
        services::{MediaService, MockStorageService},
        webhook::whatsapp::client::{DownloadedMedia, MockWhatsAppApi},
    };

    fn document_message() -> schemas::Message {
        serde_json::from_value(serde_json::json!({
            "from": "15550001111",
            "id": "wamid.DOC1",
            "timestamp": "1700000000",
            "type": "document",
            "document": {"id": "media-7", "mime_type": "application/pdf", "filename": "Invoice.PDF"}
        }))
        .unwrap()
    }

    #[ntex::test]
    async fn test_download_media_stores_and_records_path() {
        let mut client = MockWhatsAppApi::new();
        client
            .expect_download_media()
            .withf(|media_id| media_id == "media-7")
            .times(1)
            .returning(|_| {
                Ok(DownloadedMedia {
                    bytes: b"%PDF".to_vec(),
                    mime_type: "application/pdf".to_string(),
                })
            });

        let mut storage = MockStorageService::new();
        storage
            .expect_save_media()
            .withf(|path, body, content_type| {
                path == "15550001111/wamid.DOC1.pdf"
                    && body == b"%PDF"
                    && content_type == "application/pdf"
            })
            .times(1)
            .returning(|path, _, _| Ok(path.to_string()));

        let mut repo = MockAppRepo::new();
        repo.expect_set_message_media_url()
            .withf(|wam_id, url| wam_id == "wamid.DOC1" && url == "15550001111/wamid.DOC1.pdf")
            .times(1)
            .returning(|_, _| Ok(()));

        let handler = MediaHandler {
            client: Arc::new(client),
            storage: Arc::new(storage),
            repo: Arc::new(repo),
        };

        handler.download_media(&document_message()).await.unwrap();
    }

    #[ntex::test]
    async fn test_download_failure_skips_storage() {
        let mut client = MockWhatsAppApi::new();
        client
            .expect_download_media()
            .returning(|_| Err(client::ClientError::Timeout));

        let handler = MediaHandler {
            client: Arc::new(client),
            storage: Arc::new(MockStorageService::new()),
            repo: Arc::new(MockAppRepo::new()),
        };

        assert!(handler.download_media(&document_message()).await.is_err());
    }
}
