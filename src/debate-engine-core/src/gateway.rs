//! Model Gateway: a single `generate` call over heterogeneous providers.
//!
//! Every provider is reached through the same `async-openai` client,
//! configured per call with the binding's base URL and credential. This
//! works for cloud providers that speak the OpenAI chat-completions
//! dialect as well as local engines such as Ollama, which only differ in
//! `api_base`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use tracing::warn;

use crate::error::EngineError;
use crate::models::ModelBinding;

/// One turn of conversation handed to the gateway, independent of the
/// debate's own `Message` shape.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

const MAX_ATTEMPTS: u32 = 3;

/// Abstraction over "call a model and get text back", so the rest of the
/// engine can be tested against a fake implementation without a network.
#[async_trait::async_trait]
pub trait ModelProvider: Send + Sync {
    async fn generate(
        &self,
        binding: &ModelBinding,
        system_prompt: &str,
        history: &[ChatTurn],
        temperature: f32,
        max_tokens: u32,
        cancel: &Arc<AtomicBool>,
    ) -> Result<String, EngineError>;
}

/// The production gateway: a thin `async-openai` client plus the retry
/// and error-normalization policy from the specification.
pub struct OpenAiGateway;

impl OpenAiGateway {
    pub fn new() -> Self {
        Self
    }

    fn build_client(binding: &ModelBinding) -> Client<OpenAIConfig> {
        let mut config = OpenAIConfig::new();
        if let Some(base) = &binding.api_base {
            config = config.with_api_base(base.clone());
        }
        if let Some(env_var) = &binding.api_key_env {
            if let Ok(key) = std::env::var(env_var) {
                config = config.with_api_key(key);
            }
        }
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Client::with_config(config).with_http_client(http_client)
    }

    fn build_request(
        binding: &ModelBinding,
        system_prompt: &str,
        history: &[ChatTurn],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<async_openai::types::chat::CreateChatCompletionRequest, EngineError> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(history.len() + 1);
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()
                .map_err(EngineError::OpenAIError)?
                .into(),
        );
        for turn in history {
            let message = match turn.role {
                ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content.clone())
                    .build()
                    .map_err(EngineError::OpenAIError)?
                    .into(),
                ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content.clone())
                    .build()
                    .map_err(EngineError::OpenAIError)?
                    .into(),
            };
            messages.push(message);
        }

        CreateChatCompletionRequestArgs::default()
            .model(&binding.model)
            .messages(messages)
            .temperature(temperature)
            .max_completion_tokens(max_tokens)
            .build()
            .map_err(EngineError::OpenAIError)
    }

    fn classify(binding: &ModelBinding, err: &async_openai::error::OpenAIError) -> (EngineError, bool) {
        use async_openai::error::OpenAIError;
        match err {
            OpenAIError::ApiError(api_err) => {
                // async-openai builds `ApiError` from the response body for
                // every non-2xx status, so the raw HTTP status is gone by
                // this point; the provider's own `code` field and message
                // text are all that distinguish a 429/5xx from a genuine
                // 4xx, the same way OpenAI-compatible providers distinguish
                // them in their error bodies.
                let code = api_err.code.as_deref().unwrap_or("");
                let message = api_err.message.to_ascii_lowercase();
                let cause = api_err.message.clone();

                let is_auth = code == "invalid_api_key"
                    || code.contains("auth")
                    || message.contains("api key")
                    || message.contains("authentication");
                let is_rate_limited = code.contains("rate_limit")
                    || message.contains("rate limit")
                    || message.contains("too many requests");
                let is_server_error = code.contains("server_error")
                    || code.contains("service_unavailable")
                    || message.contains("server error")
                    || message.contains("service unavailable")
                    || message.contains("overloaded")
                    || message.contains("internal error")
                    || message.contains("bad gateway");

                if is_auth {
                    (
                        EngineError::UpstreamAuth {
                            provider: binding.provider.clone(),
                            model: binding.model.clone(),
                            cause,
                        },
                        false,
                    )
                } else if is_rate_limited || is_server_error {
                    (
                        EngineError::UpstreamUnavailable {
                            provider: binding.provider.clone(),
                            model: binding.model.clone(),
                            cause,
                        },
                        true,
                    )
                } else {
                    (
                        EngineError::UpstreamMalformed {
                            provider: binding.provider.clone(),
                            model: binding.model.clone(),
                            cause,
                        },
                        false,
                    )
                }
            }
            OpenAIError::Reqwest(reqwest_err) => {
                let retryable = reqwest_err.is_timeout()
                    || reqwest_err.is_connect()
                    || reqwest_err
                        .status()
                        .map(|s| s.as_u16() == 429 || s.as_u16() >= 500)
                        .unwrap_or(true);
                (
                    EngineError::UpstreamUnavailable {
                        provider: binding.provider.clone(),
                        model: binding.model.clone(),
                        cause: reqwest_err.to_string(),
                    },
                    retryable,
                )
            }
            other => (
                EngineError::UpstreamUnavailable {
                    provider: binding.provider.clone(),
                    model: binding.model.clone(),
                    cause: other.to_string(),
                },
                true,
            ),
        }
    }
}

impl Default for OpenAiGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ModelProvider for OpenAiGateway {
    async fn generate(
        &self,
        binding: &ModelBinding,
        system_prompt: &str,
        history: &[ChatTurn],
        temperature: f32,
        max_tokens: u32,
        cancel: &Arc<AtomicBool>,
    ) -> Result<String, EngineError> {
        let client = Self::build_client(binding);
        let request = Self::build_request(binding, system_prompt, history, temperature, max_tokens)?;

        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            if cancel.load(Ordering::SeqCst) {
                return Err(EngineError::Cancelled(uuid::Uuid::nil()));
            }

            match client.chat().create(request.clone()).await {
                Ok(response) => {
                    let content = response
                        .choices
                        .first()
                        .and_then(|choice| choice.message.content.clone())
                        .ok_or_else(|| EngineError::UpstreamMalformed {
                            provider: binding.provider.clone(),
                            model: binding.model.clone(),
                            cause: "response contained no message content".into(),
                        })?;
                    return Ok(content);
                }
                Err(err) => {
                    let (normalized, retryable) = Self::classify(binding, &err);
                    if !retryable || attempt + 1 == MAX_ATTEMPTS {
                        return Err(normalized);
                    }
                    let backoff = Duration::from_secs(1 << attempt);
                    warn!(
                        provider = %binding.provider,
                        model = %binding.model,
                        attempt = attempt + 1,
                        backoff_secs = backoff.as_secs(),
                        "retrying model call after transient failure"
                    );
                    last_err = Some(normalized);
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| EngineError::UpstreamUnavailable {
            provider: binding.provider.clone(),
            model: binding.model.clone(),
            cause: "retries exhausted".into(),
        }))
    }
}
