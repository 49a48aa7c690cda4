use crate::{models, repo, webhook::whatsapp::schemas};
use async_trait::async_trait;

/// Keeps broadcast recipients and unread counters in sync with the webhook
/// stream. Every write is conditional so repeated notifications are no-ops.
#[derive(Clone)]
pub struct NotificationHandler {
    pub repo: repo::ImplAppRepo,
}

#[async_trait]
impl crate::services::NotificationService for NotificationHandler {
    async fn broadcast_reply(&self, messages: &[schemas::Message]) -> anyhow::Result<()> {
        for message in messages {
            let Some(context) = &message.context else {
                continue;
            };

            let replied_at = match message.created_at() {
                Ok(at) => at,
                Err(e) => {
                    logfire::warn!(
                        "skipping reply {wam_id}: {error}",
                        wam_id = message.id.clone(),
                        error = e.to_string()
                    );
                    continue;
                }
            };

            let replied = self
                .repo
                .mark_broadcast_replied(&context.id, replied_at)
                .await?;

            if replied {
                logfire::info!(
                    "broadcast message {wam_id} got a reply from {wa_id}",
                    wam_id = context.id.clone(),
                    wa_id = message.from.clone()
                );
            }
        }

        Ok(())
    }

    async fn broadcast_status(
        &self,
        transition: &models::message::StatusTransition,
    ) -> anyhow::Result<()> {
        self.repo
            .update_broadcast_status(&transition.wam_id, transition.status, transition.at)
            .await?;

        Ok(())
    }

    async fn refresh_unread_count(&self, wa_ids: &[String]) -> anyhow::Result<()> {
        self.repo.refresh_unread_counts(wa_ids).await
    }
}
