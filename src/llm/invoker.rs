//! Model Invoker
//!
//! The single door every agent uses to reach the model. Each attempt is bounded
//! by the configured timeout; transport failures and timeouts are retried with
//! backoff and end in [`AppError::ModelUnavailable`]. Structured calls must
//! parse into the caller's schema, otherwise the same prompt is re-issued and
//! repeated failure ends in [`AppError::MalformedModelOutput`].

use crate::config::Config;
use crate::llm::provider::LLMAdapter;
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest, LLMResponse};
use crate::utils::retry::{with_retry, RetryPolicy};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const JSON_INSTRUCTION: &str = "Respond with valid JSON only, no additional text.";
const SNIPPET_LEN: usize = 200;

#[derive(Debug, Clone)]
pub struct InvokerSettings {
    pub model: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub max_parse_attempts: u32,
    /// Emit one structured event per model call
    pub tracking: bool,
}

impl InvokerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.ollama.model.clone(),
            timeout: config.ollama.timeout(),
            retry: RetryPolicy::new(config.ollama.max_retries, config.ollama.retry_backoff()),
            max_parse_attempts: config.ollama.max_parse_attempts.max(1),
            tracking: config.tracking.enabled,
        }
    }
}

/// One prompt for the model
#[derive(Debug, Clone)]
pub struct ModelCall {
    /// Short name used in logs and error context, e.g. `"review"`
    pub label: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl ModelCall {
    pub fn new(label: impl Into<String>, system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            system: system.into(),
            prompt: prompt.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Clone)]
pub struct ModelInvoker {
    adapter: Arc<dyn LLMAdapter>,
    settings: InvokerSettings,
}

impl ModelInvoker {
    pub fn new(adapter: Arc<dyn LLMAdapter>, settings: InvokerSettings) -> Self {
        Self { adapter, settings }
    }

    pub fn settings(&self) -> &InvokerSettings {
        &self.settings
    }

    /// Free-form generation
    pub async fn invoke_text(&self, call: &ModelCall) -> AppResult<String> {
        let response = self.complete(call, &call.prompt, false).await?;
        Ok(response.content)
    }

    /// Structured generation validated against `T`
    pub async fn invoke_json<T: DeserializeOwned>(&self, call: &ModelCall) -> AppResult<T> {
        let prompt = format!("{}\n\n{}", call.prompt, JSON_INSTRUCTION);
        let mut last_reason = String::new();

        for attempt in 1..=self.settings.max_parse_attempts {
            let response = self.complete(call, &prompt, true).await?;
            match parse_json::<T>(&response.content) {
                Ok(value) => return Ok(value),
                Err(reason) => {
                    warn!(
                        call = %call.label,
                        attempt,
                        max_attempts = self.settings.max_parse_attempts,
                        error = %reason,
                        "Model returned unparseable JSON"
                    );
                    last_reason = format!("{} (response: {})", reason, snippet(&response.content));
                }
            }
        }

        error!(call = %call.label, "Giving up on malformed structured output");
        Err(AppError::malformed(call.label.clone(), last_reason))
    }

    /// One logical completion: timeout per attempt, bounded retries
    async fn complete(&self, call: &ModelCall, prompt: &str, json_mode: bool) -> AppResult<LLMResponse> {
        let request = LLMRequest {
            model: self.settings.model.clone(),
            messages: vec![LLMMessage::user(prompt)],
            max_tokens: call.max_tokens,
            temperature: Some(call.temperature),
            system_instruction: Some(call.system.clone()),
            json_mode,
        };

        let timeout = self.settings.timeout;
        let result = with_retry(
            self.settings.retry,
            |attempt| {
                let request = &request;
                async move {
                    let started = Instant::now();
                    let outcome = match tokio::time::timeout(
                        timeout,
                        self.adapter.create_chat_completion(request),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(AppError::Timeout(timeout)),
                    };
                    self.track(call, request, attempt, started, &outcome);
                    outcome
                }
            },
            AppError::is_transient,
        )
        .await;

        result.map_err(|failure| {
            if failure.error.is_transient() {
                error!(
                    call = %call.label,
                    attempts = failure.attempts,
                    error = %failure.error,
                    "Model unavailable"
                );
                AppError::ModelUnavailable {
                    attempts: failure.attempts,
                    reason: failure.error.to_string(),
                }
            } else {
                failure.error
            }
        })
    }

    fn track(
        &self,
        call: &ModelCall,
        request: &LLMRequest,
        attempt: u32,
        started: Instant,
        outcome: &AppResult<LLMResponse>,
    ) {
        if !self.settings.tracking {
            return;
        }

        let prompt_chars = request
            .messages
            .iter()
            .map(|m| m.content.len())
            .sum::<usize>();
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(response) => info!(
                target: "essay_agents::tracking",
                call = %call.label,
                backend = self.adapter.name(),
                model = %request.model,
                attempt,
                json_mode = request.json_mode,
                temperature = call.temperature,
                prompt_chars,
                response_chars = response.content.len(),
                prompt_tokens = response.usage.prompt_tokens,
                completion_tokens = response.usage.completion_tokens,
                latency_ms,
                "model call"
            ),
            Err(e) => info!(
                target: "essay_agents::tracking",
                call = %call.label,
                backend = self.adapter.name(),
                model = %request.model,
                attempt,
                prompt_chars,
                latency_ms,
                error = %e,
                "model call failed"
            ),
        }
    }
}

/// Strip optional Markdown code fences around a JSON payload
pub fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.split("```").next().unwrap_or(rest).trim()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.split("```").next().unwrap_or(rest).trim()
    } else if trimmed.contains("```json") {
        trimmed
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(trimmed)
            .trim()
    } else {
        trimmed
    }
}

fn parse_json<T: DeserializeOwned>(response: &str) -> Result<T, String> {
    serde_json::from_str(extract_json(response)).map_err(|e| e.to_string())
}

fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_LEN).collect()
}
