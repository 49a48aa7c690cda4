//! Collaborators consumed by the inbox: object storage, media download,
//! broadcast/unread notifications, text completion and business actions.

pub mod business;
pub mod completion;
pub mod media;
pub mod notification;
pub mod storage;

use crate::{models, webhook::whatsapp::schemas};
use async_trait::async_trait;
use std::sync::Arc;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Stores `body` under `path` and returns the durable path
    async fn save_media(
        &self,
        path: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> anyhow::Result<String>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaService: Send + Sync {
    /// Fetches the media of an inbound message and records where it was stored.
    /// Safe to repeat for the same `wam_id`.
    async fn download_media(&self, message: &schemas::Message) -> anyhow::Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Inbound batch, used to flag broadcast recipients that replied
    async fn broadcast_reply(&self, messages: &[schemas::Message]) -> anyhow::Result<()>;

    /// First-time status transition of an outbound message
    async fn broadcast_status(
        &self,
        transition: &models::message::StatusTransition,
    ) -> anyhow::Result<()>;

    async fn refresh_unread_count(&self, wa_ids: &[String]) -> anyhow::Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Completes `prompt` with the fixed system context of the assistant
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BusinessService: Send + Sync {
    async fn apply_smart_price(&self, user_id: &str) -> anyhow::Result<()>;
}

pub type ImplStorageService = Arc<dyn StorageService>;
pub type ImplMediaService = Arc<dyn MediaService>;
pub type ImplNotificationService = Arc<dyn NotificationService>;
pub type ImplCompletionService = Arc<dyn CompletionService>;
pub type ImplBusinessService = Arc<dyn BusinessService>;
