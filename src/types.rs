// Type definitions shared across the pipeline: LLM request/response shapes and the error type

use crate::workflow::Stage;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMRequest {
    pub model: String,
    pub messages: Vec<LLMMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_instruction: Option<String>,
    /// Ask the backend to constrain its output to JSON
    #[serde(default)]
    pub json_mode: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LLMMessage {
    pub role: String, // "user", "assistant", "system"
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub finish_reason: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad or missing input detected before any agent runs
    #[error("Input error: {0}")]
    Input(String),

    /// Transport failure reported by an adapter for a single attempt
    #[error("LLM API error: {0}")]
    LLMApi(String),

    /// A single attempt exceeded the invocation timeout
    #[error("LLM call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Transport failures persisted through every retry
    #[error("Model unavailable after {attempts} attempt(s): {reason}")]
    ModelUnavailable { attempts: u32, reason: String },

    /// Structured output could not be parsed, or an agent produced output the pipeline cannot use
    #[error("Malformed model output ({context}): {reason}")]
    MalformedModelOutput { context: String, reason: String },

    /// An agent failed; carries the stage for diagnostics
    #[error("Stage {stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<AppError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::MalformedModelOutput {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Wrap this error with the stage it surfaced in (idempotent)
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            AppError::Stage { .. } => self,
            other => AppError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through stage wrappers
    pub fn root(&self) -> &AppError {
        match self {
            AppError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// The stage the error surfaced in, if it came from an agent
    pub fn stage(&self) -> Option<Stage> {
        match self {
            AppError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether the invoker may retry the attempt that produced this error
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::LLMApi(_) | AppError::Timeout(_))
    }

    /// Short category used in user-facing diagnostics
    pub fn category(&self) -> &'static str {
        match self.root() {
            AppError::Input(_) => "missing or invalid input",
            AppError::LLMApi(_) | AppError::Timeout(_) | AppError::ModelUnavailable { .. } => {
                "model connectivity"
            }
            AppError::MalformedModelOutput { .. } => "malformed model output",
            AppError::Io(_) => "file system",
            AppError::Serialization(_) => "serialization",
            AppError::Stage { .. } | AppError::Internal(_) => "internal",
        }
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
