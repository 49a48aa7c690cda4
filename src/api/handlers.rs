//! Handlers behind the button actions.

use crate::{
    api::{
        action::{ActionHandlers, AssistantReplyRequest, SmartPriceRequest},
        sender::{OutboundSender, SendMessageRequest},
    },
    consts, services,
};
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Clone)]
pub struct BusinessActions {
    pub sender: Arc<OutboundSender>,
    pub business: services::ImplBusinessService,
    pub completion: services::ImplCompletionService,
}

impl BusinessActions {
    async fn reply(&self, wa_id: &str, text: String) -> anyhow::Result<()> {
        self.sender
            .send(SendMessageRequest {
                to: wa_id.to_string(),
                message: Some(text),
                ..Default::default()
            })
            .await
            .with_context(|| format!("failed to reply to {wa_id}"))?;

        Ok(())
    }
}

#[async_trait]
impl ActionHandlers for BusinessActions {
    async fn enable_smart_price(&self, request: &SmartPriceRequest) -> anyhow::Result<()> {
        logfire::info!(
            "enabling smart price for user {user_id}",
            user_id = request.user_id.clone()
        );

        self.business.apply_smart_price(&request.user_id).await?;

        self.reply(
            &request.wa_id,
            consts::SMART_PRICE_CONFIRMATION_TEXT.to_string(),
        )
        .await
    }

    async fn assistant_reply(&self, request: &AssistantReplyRequest) -> anyhow::Result<()> {
        let answer = match self.completion.complete(&request.message).await {
            Ok(answer) => answer,
            Err(e) => {
                logfire::error!(
                    "assistant completion failed for {wa_id}: {error}",
                    wa_id = request.wa_id.clone(),
                    error = e.to_string()
                );
                consts::ASSISTANT_FALLBACK_TEXT.to_string()
            }
        };

        self.reply(&request.wa_id, answer).await
    }
}
