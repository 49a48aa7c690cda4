pub mod sqlite;
pub mod sqlite_queries;

use crate::models;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Persistence boundary of the inbox.
///
/// Idempotency lives here: message inserts ignore duplicated `wam_id`s and
/// status updates only apply forward transitions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AppRepo: Send + Sync {
    /// Appends the raw webhook entries, all or nothing
    async fn insert_webhook_entries(&self, entries: &[serde_json::Value]) -> anyhow::Result<()>;

    async fn upsert_contact(
        &self,
        contact: &models::contact::ContactSighting,
    ) -> anyhow::Result<()>;

    async fn get_contact(&self, wa_id: &str) -> anyhow::Result<Option<models::contact::Contact>>;

    async fn touch_contact_last_message(
        &self,
        wa_id: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    async fn refresh_unread_counts(&self, wa_ids: &[String]) -> anyhow::Result<()>;

    /// Inserts the messages in one transaction and returns the `wam_id`s
    /// that were new. Already stored `wam_id`s are skipped.
    async fn insert_messages(
        &self,
        messages: &[models::message::NewMessage],
    ) -> anyhow::Result<Vec<String>>;

    async fn get_message(
        &self,
        wam_id: &str,
    ) -> anyhow::Result<Option<models::message::StoredMessage>>;

    async fn set_message_media_url(&self, wam_id: &str, media_url: &str) -> anyhow::Result<()>;

    /// Applies a forward status transition.
    ///
    /// Returns `false` when no row changed: the message is unknown or it
    /// already reached `status` or a later one.
    async fn update_message_status(
        &self,
        wam_id: &str,
        status: models::message::MessageStatus,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;

    async fn get_message_template(
        &self,
        name: &str,
        language: &str,
    ) -> anyhow::Result<Option<models::template::TemplateDefinition>>;

    async fn upsert_message_template(
        &self,
        template: &models::template::TemplateDefinition,
    ) -> anyhow::Result<()>;

    /// Stamps `replied_at` on the broadcast recipients whose message was replied to
    async fn mark_broadcast_replied(
        &self,
        wam_id: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;

    async fn update_broadcast_status(
        &self,
        wam_id: &str,
        status: models::message::MessageStatus,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;
}

pub type ImplAppRepo = Arc<dyn AppRepo>;
