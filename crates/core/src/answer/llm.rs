//! Answers produced by a hosted chat-completion model over retrieved context.

use crate::error::AnswerError;
use crate::models::{Answer, AnswerMode, QueryResult};
use crate::traits::{ChatMessage, ChatModel};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Clone, PartialEq)]
pub struct ChatModelConfig {
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for ChatModelConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.2,
            max_tokens: 512,
            timeout: Duration::from_secs(60),
        }
    }
}

pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the following question using only the provided context:\n{context}\n\nQuestion: {question}\nAnswer:"
    )
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
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

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

fn first_choice_content(response: ChatCompletionResponse) -> Result<String, AnswerError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(AnswerError::EmptyCompletion)
}

fn error_details(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// [`ChatModel`] for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiChatClient {
    client: Client,
    api_key: String,
    config: ChatModelConfig,
}

impl OpenAiChatClient {
    pub fn new(api_key: impl Into<String>, config: ChatModelConfig) -> Result<Self, AnswerError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AnswerError::MissingApiKey(config.api_base));
        }

        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            config,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatModel for OpenAiChatClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AnswerError> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!(model = %self.config.model, messages = messages.len(), "sending chat completion");

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let details = error_details(&body);
            error!(status = %status, details = %details, "chat completion failed");
            return Err(AnswerError::BackendResponse {
                backend: self.config.api_base.clone(),
                details: format!("{status}: {details}"),
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)?;
        first_choice_content(parsed)
    }
}

/// Sends the retrieved context and question to `model`; an empty retrieval skips the call.
pub async fn llm_answer<M>(model: &M, result: &QueryResult) -> Result<Answer, AnswerError>
where
    M: ChatModel + ?Sized,
{
    if result.is_empty() {
        return Ok(Answer {
            mode: AnswerMode::Llm,
            text: format!(
                "I couldn't find anything in your documents related to \"{}\".",
                result.query.trim()
            ),
            sources: Vec::new(),
        });
    }

    debug!(model = %model.model_name(), hits = result.hits.len(), "asking chat model");
    let prompt = build_prompt(&result.context, result.query.trim());
    let text = model.complete(&[ChatMessage::user(prompt)]).await?;

    Ok(Answer {
        mode: AnswerMode::Llm,
        text,
        sources: result.sources(),
    })
}
