// Ollama adapter for a local inference server
// API Reference: https://github.com/ollama/ollama/blob/main/docs/api.md
//
// Uses the non-streaming chat endpoint. JSON mode sets `format: "json"`, which
// makes the server constrain decoding to valid JSON.

use crate::llm::provider::LLMAdapter;
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

pub struct OllamaAdapter {
    client: Client,
    base_url: String,
    model: String,
}

// Request types for the Ollama API
#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

// Response types for the Ollama API
#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct OllamaErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModelTag>,
}

#[derive(Deserialize)]
struct OllamaModelTag {
    name: String,
}

impl OllamaAdapter {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }
}

#[async_trait]
impl LLMAdapter for OllamaAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_instruction {
            messages.push(OllamaMessage {
                role: "system",
                content: system,
            });
        }
        messages.extend(request.messages.iter().map(|m| OllamaMessage {
            role: &m.role,
            content: &m.content,
        }));

        let body = OllamaChatRequest {
            model: &request.model,
            messages,
            stream: false,
            format: if request.json_mode { Some("json") } else { None },
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .client
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LLMApi(format!("Ollama request failed: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if let Ok(error_response) = serde_json::from_str::<OllamaErrorResponse>(&error_text) {
                return Err(AppError::LLMApi(format!(
                    "Ollama API error ({}): {}",
                    status, error_response.error
                )));
            }

            return Err(AppError::LLMApi(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let chat: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLMApi(format!("Failed to parse Ollama response: {}", e)))?;

        let prompt_tokens = chat.prompt_eval_count.unwrap_or(0);
        let completion_tokens = chat.eval_count.unwrap_or(0);
        debug!(prompt_tokens, completion_tokens, "Ollama chat completed");

        Ok(LLMResponse {
            content: chat.message.content,
            finish_reason: chat.done_reason.unwrap_or_else(|| "stop".to_string()),
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
        })
    }

    async fn health_check(&self) -> AppResult<()> {
        let response = self
            .client
            .get(self.tags_url())
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                AppError::LLMApi(format!(
                    "Cannot connect to Ollama at {}: {}",
                    self.base_url, e
                ))
            })?;

        if !response.status().is_success() {
            return Err(AppError::LLMApi(format!(
                "Ollama at {} answered {}",
                self.base_url,
                response.status()
            )));
        }

        // A missing model is only a warning: the server may pull it on first use
        match response.json::<OllamaTagsResponse>().await {
            Ok(tags) if !tags.models.iter().any(|m| m.name == self.model) => {
                warn!(model = %self.model, "Model not listed by Ollama; the first call may fail");
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Could not read Ollama model list"),
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
