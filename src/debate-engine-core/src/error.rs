//! Error types for the debate engine.

use thiserror::Error;
use uuid::Uuid;

/// A stable error taxonomy shared by every component of the engine.
///
/// Validation/transition errors are returned synchronously to callers.
/// Execution errors raised while a debate is running are never returned
/// this way; they are recorded on the debate's `error_message` field and
/// published as an `error` event instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid debate configuration: {0}")]
    InvalidConfig(String),

    #[error("debate {0} not found")]
    NotFound(Uuid),

    #[error("invalid state transition for debate {id}: {detail}")]
    InvalidTransition { id: Uuid, detail: String },

    #[error("upstream unavailable after retries for {provider}/{model}: {cause}")]
    UpstreamUnavailable {
        provider: String,
        model: String,
        cause: String,
    },

    #[error("upstream authentication failed for {provider}/{model}: {cause}")]
    UpstreamAuth {
        provider: String,
        model: String,
        cause: String,
    },

    #[error("upstream returned malformed content for {provider}/{model}: {cause}")]
    UpstreamMalformed {
        provider: String,
        model: String,
        cause: String,
    },

    #[error("judge output could not be parsed: {0}")]
    JudgeUnparseable(String),

    #[error("debate {0} was cancelled")]
    Cancelled(Uuid),

    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("underlying OpenAI-compatible client error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),
}

impl EngineError {
    /// A short, stable tag for the error's kind, used in `error` events
    /// and logs where the full `Display` text would be too verbose.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidConfig(_) => "invalid_config",
            EngineError::NotFound(_) => "not_found",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::UpstreamUnavailable { .. } => "upstream_unavailable",
            EngineError::UpstreamAuth { .. } => "upstream_auth",
            EngineError::UpstreamMalformed { .. } => "upstream_malformed",
            EngineError::JudgeUnparseable(_) => "judge_unparseable",
            EngineError::Cancelled(_) => "cancelled",
            EngineError::UnsupportedFormat(_) => "unsupported_format",
            EngineError::OpenAIError(_) => "upstream_unavailable",
        }
    }
}
