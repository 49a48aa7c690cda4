use crate::models;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Row, SqlitePool, sqlite::SqliteRow};
use uuid::Uuid;

use super::{AppRepo, sqlite_queries};

#[derive(Clone)]
pub struct SqlxSqliteRepo {
    pub db_pool: SqlitePool,
}

impl FromRow<'_, SqliteRow> for models::template::TemplateDefinition {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let components: String = row.try_get("components")?;

        Ok(Self {
            name: row.try_get("name")?,
            language: row.try_get("language")?,
            category: row.try_get("category")?,
            components: serde_json::from_str(&components).map_err(|e| {
                sqlx::Error::ColumnDecode {
                    index: "components".into(),
                    source: Box::new(e),
                }
            })?,
        })
    }
}

#[async_trait]
impl AppRepo for SqlxSqliteRepo {
    async fn insert_webhook_entries(&self, entries: &[serde_json::Value]) -> anyhow::Result<()> {
        let mut transaction = self.db_pool.begin().await?;
        let received_at = Utc::now();

        for entry in entries {
            sqlx::query(sqlite_queries::QUERY_INSERT_WEBHOOK_EVENT)
                .bind(Uuid::new_v4().to_string())
                .bind(entry.to_string())
                .bind(received_at)
                .execute(&mut *transaction)
                .await?;
        }

        transaction.commit().await?;
        Ok(())
    }

    async fn upsert_contact(
        &self,
        contact: &models::contact::ContactSighting,
    ) -> anyhow::Result<()> {
        Ok(sqlx::query(sqlite_queries::QUERY_UPSERT_CONTACT)
            .bind(&contact.wa_id)
            .bind(&contact.profile_name)
            .bind(contact.seen_at)
            .execute(&self.db_pool)
            .await
            .map(|_| ())?)
    }

    async fn get_contact(&self, wa_id: &str) -> anyhow::Result<Option<models::contact::Contact>> {
        Ok(
            sqlx::query_as::<_, models::contact::Contact>(sqlite_queries::QUERY_GET_CONTACT)
                .bind(wa_id)
                .fetch_optional(&self.db_pool)
                .await?,
        )
    }

    async fn touch_contact_last_message(
        &self,
        wa_id: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        Ok(sqlx::query(sqlite_queries::QUERY_TOUCH_CONTACT_LAST_MESSAGE)
            .bind(wa_id)
            .bind(at)
            .execute(&self.db_pool)
            .await
            .map(|_| ())?)
    }

    async fn refresh_unread_counts(&self, wa_ids: &[String]) -> anyhow::Result<()> {
        for wa_id in wa_ids {
            sqlx::query(sqlite_queries::QUERY_REFRESH_UNREAD_COUNT)
                .bind(wa_id)
                .execute(&self.db_pool)
                .await?;
        }

        Ok(())
    }

    async fn insert_messages(
        &self,
        messages: &[models::message::NewMessage],
    ) -> anyhow::Result<Vec<String>> {
        let mut transaction = self.db_pool.begin().await?;
        let mut inserted = Vec::with_capacity(messages.len());

        for message in messages {
            let rows_affected = sqlx::query(sqlite_queries::QUERY_INSERT_MESSAGE)
                .bind(&message.wam_id)
                .bind(&message.chat_id)
                .bind(&message.msg_type)
                .bind(message.payload.to_string())
                .bind(message.is_received)
                .bind(&message.media_url)
                .bind(message.created_at)
                .execute(&mut *transaction)
                .await
                .with_context(|| format!("failed to insert message {}", message.wam_id))?
                .rows_affected();

            if rows_affected > 0 {
                inserted.push(message.wam_id.clone());
            }
        }

        transaction.commit().await?;
        Ok(inserted)
    }

    async fn get_message(
        &self,
        wam_id: &str,
    ) -> anyhow::Result<Option<models::message::StoredMessage>> {
        Ok(
            sqlx::query_as::<_, models::message::StoredMessage>(sqlite_queries::QUERY_GET_MESSAGE)
                .bind(wam_id)
                .fetch_optional(&self.db_pool)
                .await?,
        )
    }

    async fn set_message_media_url(&self, wam_id: &str, media_url: &str) -> anyhow::Result<()> {
        Ok(sqlx::query(sqlite_queries::QUERY_SET_MESSAGE_MEDIA_URL)
            .bind(wam_id)
            .bind(media_url)
            .execute(&self.db_pool)
            .await
            .map(|_| ())?)
    }

    async fn update_message_status(
        &self,
        wam_id: &str,
        status: models::message::MessageStatus,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        use models::message::MessageStatus;

        let query = match status {
            MessageStatus::Sent => sqlite_queries::QUERY_UPDATE_MESSAGE_SENT_STATUS,
            MessageStatus::Delivered => sqlite_queries::QUERY_UPDATE_MESSAGE_DELIVERED_STATUS,
            MessageStatus::Read => sqlite_queries::QUERY_UPDATE_MESSAGE_READ_STATUS,
            MessageStatus::Failed => sqlite_queries::QUERY_UPDATE_MESSAGE_FAILED_STATUS,
            MessageStatus::Unsent => anyhow::bail!("a message can't transition back to unsent"),
        };

        let rows_affected = sqlx::query(query)
            .bind(wam_id)
            .bind(at)
            .execute(&self.db_pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn get_message_template(
        &self,
        name: &str,
        language: &str,
    ) -> anyhow::Result<Option<models::template::TemplateDefinition>> {
        Ok(sqlx::query_as::<_, models::template::TemplateDefinition>(
            sqlite_queries::QUERY_GET_MESSAGE_TEMPLATE,
        )
        .bind(name)
        .bind(language)
        .fetch_optional(&self.db_pool)
        .await?)
    }

    async fn upsert_message_template(
        &self,
        template: &models::template::TemplateDefinition,
    ) -> anyhow::Result<()> {
        Ok(sqlx::query(sqlite_queries::QUERY_UPSERT_MESSAGE_TEMPLATE)
            .bind(&template.name)
            .bind(&template.language)
            .bind(&template.category)
            .bind(serde_json::to_string(&template.components)?)
            .bind(Utc::now())
            .execute(&self.db_pool)
            .await
            .map(|_| ())?)
    }

    async fn mark_broadcast_replied(
        &self,
        wam_id: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let rows_affected = sqlx::query(sqlite_queries::QUERY_MARK_BROADCAST_REPLIED)
            .bind(wam_id)
            .bind(at)
            .execute(&self.db_pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn update_broadcast_status(
        &self,
        wam_id: &str,
        status: models::message::MessageStatus,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        use models::message::MessageStatus;

        let query = match status {
            MessageStatus::Sent => sqlite_queries::QUERY_BROADCAST_SENT,
            MessageStatus::Delivered => sqlite_queries::QUERY_BROADCAST_DELIVERED,
            MessageStatus::Read => sqlite_queries::QUERY_BROADCAST_READ,
            MessageStatus::Failed => sqlite_queries::QUERY_BROADCAST_FAILED,
            MessageStatus::Unsent => return Ok(false),
        };

        let rows_affected = sqlx::query(query)
            .bind(wam_id)
            .bind(at)
            .execute(&self.db_pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }
}
