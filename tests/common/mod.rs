#![allow(dead_code)]

use async_trait::async_trait;
use essay_agents::agents::prompts::{
    CITATION_SYSTEM, EDITOR_SYSTEM, OUTLINE_SYSTEM, RESEARCH_SYSTEM, REVIEW_SYSTEM, WRITER_SYSTEM,
};
use essay_agents::config::Config;
use essay_agents::llm::LLMAdapter;
use essay_agents::types::{AppError, AppResult, LLMRequest, LLMResponse, TokenUsage};
use essay_agents::RunRequest;
use serde_json::json;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

pub const SUPPORTED_CLAIM: &str = "self-attention lets every token attend to every other token";
pub const CITED_CHUNK: &str = "vaswani.txt#0";

/// A model that answers every agent's prompt with canned, well-formed output.
/// Review scores are consumed in order; the last one repeats.
pub struct ScriptedModel {
    scores: Mutex<VecDeque<f64>>,
    hang: Option<Duration>,
    writer_calls: AtomicU32,
    requests: Mutex<Vec<(String, String)>>,
}

impl ScriptedModel {
    pub fn with_scores(scores: &[f64]) -> Self {
        Self {
            scores: Mutex::new(scores.iter().copied().collect()),
            hang: None,
            writer_calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Never answers within any sensible timeout
    pub fn hanging() -> Self {
        let mut model = Self::with_scores(&[1.0]);
        model.hang = Some(Duration::from_secs(30));
        model
    }

    pub fn writer_calls(&self) -> u32 {
        self.writer_calls.load(Ordering::SeqCst)
    }

    /// Prompts sent with the given system prompt, in order
    pub fn prompts_for(&self, system: &str) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == system)
            .map(|(_, p)| p.clone())
            .collect()
    }

    fn next_score(&self) -> f64 {
        let mut scores = self.scores.lock().unwrap();
        if scores.len() > 1 {
            scores.pop_front().unwrap()
        } else {
            *scores.front().unwrap()
        }
    }

    fn respond(&self, system: &str, prompt: &str) -> String {
        match system {
            s if s == RESEARCH_SYSTEM => json!({
                "themes": ["self-attention", "parallel training"],
                "arguments": ["Attention replaces recurrence"],
                "quotes": [{"text": "Attention is all you need", "chunk_id": CITED_CHUNK}],
                "findings": ["Training parallelizes across positions"],
                "gaps": []
            })
            .to_string(),
            s if s == OUTLINE_SYSTEM => json!({
                "title": "On Attention",
                "sections": [
                    {"title": "Mechanism", "description": "How attention works", "target_words": 300},
                    {"title": "Consequences", "description": "What it changed", "target_words": 300}
                ]
            })
            .to_string(),
            s if s == WRITER_SYSTEM => {
                let pass = self.writer_calls.fetch_add(1, Ordering::SeqCst) / 2 + 1;
                let title = prompt
                    .split("Write the \"")
                    .nth(1)
                    .and_then(|rest| rest.split('"').next())
                    .unwrap_or("unknown");
                format!(
                    "In the {} section, {}. Draft pass {} develops the argument with evidence.",
                    title, SUPPORTED_CLAIM, pass
                )
            }
            s if s == CITATION_SYSTEM => json!({
                "citations": [
                    {"claim": SUPPORTED_CLAIM, "chunk_id": CITED_CHUNK, "author": "A. Vaswani", "year": "2017"},
                    {"claim": SUPPORTED_CLAIM, "chunk_id": "ghost.pdf#9", "author": "Nobody", "year": "1999"},
                    {"claim": "recurrent networks are obsolete", "chunk_id": CITED_CHUNK, "author": "A. Vaswani", "year": "2017"}
                ]
            })
            .to_string(),
            s if s == REVIEW_SYSTEM => json!({
                "score": self.next_score(),
                "weaknesses": ["Needs more evidence for the second section"],
                "strengths": ["Clear structure"],
                "feedback": []
            })
            .to_string(),
            s if s == EDITOR_SYSTEM => json!({
                "title": "Attention, Examined",
                "introduction": "This essay examines how attention reshaped sequence modelling."
            })
            .to_string(),
            other => panic!("unexpected system prompt: {other}"),
        }
    }
}

#[async_trait]
impl LLMAdapter for ScriptedModel {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        if let Some(delay) = self.hang {
            tokio::time::sleep(delay).await;
        }
        let system = request.system_instruction.clone().unwrap_or_default();
        let prompt = request
            .messages
            .first()
            .map(|m| m.content.clone())
            .ok_or_else(|| AppError::LLMApi("empty request".to_string()))?;
        self.requests
            .lock()
            .unwrap()
            .push((system.clone(), prompt.clone()));

        Ok(LLMResponse {
            content: self.respond(&system, &prompt),
            finish_reason: "stop".to_string(),
            usage: TokenUsage::default(),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Criteria file, a literature folder with one usable file, and an output path
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("criteria.txt"),
            "Explain the mechanism precisely.\nCite the literature for every claim.",
        )
        .unwrap();

        let literature = dir.path().join("literature");
        std::fs::create_dir(&literature).unwrap();
        std::fs::write(
            literature.join("vaswani.txt"),
            "The Transformer dispenses with recurrence entirely. Self-attention lets every token \
             attend to every other token, which makes training parallel across positions.",
        )
        .unwrap();

        Self { dir }
    }

    pub fn literature(&self) -> PathBuf {
        self.dir.path().join("literature")
    }

    pub fn add_literature(&self, name: &str, bytes: &[u8]) {
        std::fs::write(self.literature().join(name), bytes).unwrap();
    }

    pub fn output(&self) -> PathBuf {
        self.dir.path().join("out").join("essay.md")
    }

    pub fn request(&self) -> RunRequest {
        RunRequest {
            topic: "Attention in sequence models".to_string(),
            criteria_path: self.dir.path().join("criteria.txt"),
            literature_dir: self.literature(),
            output_path: self.output(),
        }
    }
}

/// Fast, deterministic settings for scripted runs
pub fn test_config(max_revision_cycles: u32) -> Config {
    let mut config = Config::default();
    config.ollama.timeout_secs = 1;
    config.ollama.max_retries = 2;
    config.ollama.retry_backoff_ms = 0;
    config.review.threshold = 0.7;
    config.review.max_revision_cycles = max_revision_cycles;
    config.essay.target_length = 600;
    config.chunking.chunk_size = 200;
    config.chunking.chunk_overlap = 20;
    config
}
