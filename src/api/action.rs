//! # Button Actions
//!
//! Quick reply buttons of the outbound templates carry a JSON payload
//! `{"action": "...", "data": {...}}`. When the user presses one, the payload
//! comes back in the webhook and is decoded here into a typed [`Action`],
//! then handed to the registered handler.

use crate::metric;
use async_trait::async_trait;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{sync::Arc, time::Duration};

pub const ENABLE_SMART_PRICE_ACTION: &str = "enableSmartPrice";
pub const ASSISTANT_REPLY_ACTION: &str = "handleOpenAIResponse";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SmartPriceRequest {
    pub user_id: String,
    pub wa_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AssistantReplyRequest {
    pub message: String,
    pub wa_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    EnableSmartPrice(SmartPriceRequest),
    AssistantReply(AssistantReplyRequest),
    /// Action name without a registered handler
    Unknown(String),
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Action::EnableSmartPrice(_) => ENABLE_SMART_PRICE_ACTION,
            Action::AssistantReply(_) => ASSISTANT_REPLY_ACTION,
            Action::Unknown(name) => name,
        }
    }
}

#[derive(Debug, Display, Error)]
pub enum DecodeError {
    #[display("button payload is not an action object: {_0}")]
    InvalidPayload(#[error(not(source))] String),
    #[display("invalid data for action {action}: {reason}")]
    InvalidData { action: String, reason: String },
}

#[derive(Debug, Deserialize)]
struct ButtonActionPayload {
    action: String,
    #[serde(default)]
    data: Value,
}

/// Decodes a button payload. The sender `wa_id` is merged into the action
/// data, replacing any `wa_id` the payload carried.
pub fn decode_button_payload(payload: &str, wa_id: &str) -> Result<Action, DecodeError> {
    let ButtonActionPayload { action, data } = serde_json::from_str(payload)
        .map_err(|e| DecodeError::InvalidPayload(e.to_string()))?;

    let mut data = match data {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => {
            return Err(DecodeError::InvalidData {
                action,
                reason: format!("data must be an object, got {other}"),
            });
        }
    };
    data.insert("wa_id".to_string(), Value::String(wa_id.to_string()));
    let data = Value::Object(data);

    let invalid = |e: serde_json::Error| DecodeError::InvalidData {
        action: action.clone(),
        reason: e.to_string(),
    };

    match action.as_str() {
        ENABLE_SMART_PRICE_ACTION => Ok(Action::EnableSmartPrice(
            serde_json::from_value(data).map_err(invalid)?,
        )),
        ASSISTANT_REPLY_ACTION => Ok(Action::AssistantReply(
            serde_json::from_value(data).map_err(invalid)?,
        )),
        _ => Ok(Action::Unknown(action.clone())),
    }
}

/// Handlers of the known actions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActionHandlers: Send + Sync {
    async fn enable_smart_price(&self, request: &SmartPriceRequest) -> anyhow::Result<()>;

    async fn assistant_reply(&self, request: &AssistantReplyRequest) -> anyhow::Result<()>;
}

pub type ImplActionHandlers = Arc<dyn ActionHandlers>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    Unknown,
    /// Handler error or timeout, already logged
    Failed,
}

#[derive(Clone)]
pub struct ActionDispatcher {
    pub handlers: ImplActionHandlers,
    pub timeout: Duration,
}

impl ActionDispatcher {
    /// Runs the handler of `action`, bounded by the dispatcher timeout.
    /// Failures are logged and reported in the outcome, never returned.
    pub async fn dispatch(&self, action: &Action) -> DispatchOutcome {
        let name = action.name().to_string();

        let handled = match action {
            Action::EnableSmartPrice(request) => {
                tokio::time::timeout(self.timeout, self.handlers.enable_smart_price(request)).await
            }
            Action::AssistantReply(request) => {
                tokio::time::timeout(self.timeout, self.handlers.assistant_reply(request)).await
            }
            Action::Unknown(_) => {
                logfire::warn!("skipping unknown button action {action}", action = name);
                return DispatchOutcome::Unknown;
            }
        };

        match handled {
            Ok(Ok(())) => {
                metric::incr_action_statds(&name);
                logfire::info!("button action {action} handled", action = name);
                DispatchOutcome::Handled
            }
            Ok(Err(e)) => {
                logfire::error!(
                    "button action {action} failed: {error}",
                    action = name,
                    error = e.to_string()
                );
                DispatchOutcome::Failed
            }
            Err(_) => {
                logfire::error!(
                    "button action {action} timed out after {secs}s",
                    action = name,
                    secs = self.timeout.as_secs() as i64
                );
                DispatchOutcome::Failed
            }
        }
    }
}
