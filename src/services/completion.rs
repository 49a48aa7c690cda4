use crate::consts;
use anyhow::{Context, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions client answering with a fixed system context
#[derive(Clone)]
pub struct OpenAiCompletion {
    pub client: reqwest::Client,
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub system_context: String,
}

impl OpenAiCompletion {
    fn request_body<'a>(&'a self, prompt: &'a str) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_context,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: consts::ASSISTANT_MAX_TOKENS,
            temperature: consts::ASSISTANT_TEMPERATURE,
        }
    }
}

#[async_trait]
impl crate::services::CompletionService for OpenAiCompletion {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .context("completion request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("completion request returned {status}: {body}");
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("failed to decode completion response")?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| consts::ASSISTANT_EMPTY_RESPONSE_TEXT.to_string()))
    }
}
