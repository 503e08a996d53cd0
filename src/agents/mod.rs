//! Agent System
//!
//! Six LLM-backed agents, each a transformation from a read-only view of the
//! essay state to a [`StateDelta`]:
//!
//! - **Research Agent**: extracts themes, arguments and quotes from the literature
//! - **Outline Agent**: plans the essay's sections once
//! - **Writer Agent**: drafts every section, rewriting all of them on revision
//! - **Citation Agent**: attributes claims to literature chunks and inserts markers
//! - **Review Agent**: grades the draft against the criteria
//! - **Editor Agent**: assembles the final document with its bibliography
//!
//! ## Pipeline Overview
//!
//! ```text
//! Research → Outline → Writer → Citation → Review ─┬─→ Editor → Done
//!                        ▲                         │
//!                        └──────── revise ─────────┘
//! ```

pub mod citation;
pub mod editor;
pub mod outline;
pub mod prompts;
pub mod research;
pub mod review;
pub mod writer;

pub use citation::CitationAgent;
pub use editor::EditorAgent;
pub use outline::OutlineAgent;
pub use research::ResearchAgent;
pub use review::ReviewAgent;
pub use writer::WriterAgent;

use crate::config::Config;
use crate::llm::ModelInvoker;
use crate::state::{EssayState, StateDelta};
use crate::types::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// The closed set of pipeline agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AgentKind {
    Research,
    Outline,
    Writer,
    Citation,
    Review,
    Editor,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentKind::Research => write!(f, "research"),
            AgentKind::Outline => write!(f, "outline"),
            AgentKind::Writer => write!(f, "writer"),
            AgentKind::Citation => write!(f, "citation"),
            AgentKind::Review => write!(f, "review"),
            AgentKind::Editor => write!(f, "editor"),
        }
    }
}

#[async_trait]
pub trait EssayAgent: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// Compute this agent's fields from the current state
    async fn run(&self, state: &EssayState) -> AppResult<StateDelta>;
}

/// One agent per kind, as the workflow engine consumes them
pub struct AgentSet {
    pub research: Box<dyn EssayAgent>,
    pub outline: Box<dyn EssayAgent>,
    pub writer: Box<dyn EssayAgent>,
    pub citation: Box<dyn EssayAgent>,
    pub review: Box<dyn EssayAgent>,
    pub editor: Box<dyn EssayAgent>,
}

impl AgentSet {
    /// The standard model-backed agents sharing one invoker
    pub fn from_config(invoker: ModelInvoker, config: &Config) -> Self {
        Self {
            research: Box::new(ResearchAgent::new(
                invoker.clone(),
                config.research.chunks_per_batch,
            )),
            outline: Box::new(OutlineAgent::new(invoker.clone(), config.essay.target_length)),
            writer: Box::new(WriterAgent::new(invoker.clone())),
            citation: Box::new(CitationAgent::new(
                invoker.clone(),
                config.citation.catalogue_tokens,
            )),
            review: Box::new(ReviewAgent::new(invoker.clone())),
            editor: Box::new(EditorAgent::new(invoker)),
        }
    }

    pub fn get(&self, kind: AgentKind) -> &dyn EssayAgent {
        match kind {
            AgentKind::Research => self.research.as_ref(),
            AgentKind::Outline => self.outline.as_ref(),
            AgentKind::Writer => self.writer.as_ref(),
            AgentKind::Citation => self.citation.as_ref(),
            AgentKind::Review => self.review.as_ref(),
            AgentKind::Editor => self.editor.as_ref(),
        }
    }
}

/// Deserialize a field that models sometimes send as `null`, reading null as the default
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Lowercase, punctuation-free, single-spaced form used for near-duplicate detection
pub(crate) fn normalize_for_dedupe(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Append `items` to `target`, skipping blanks and near-duplicates of what is already there
pub(crate) fn extend_unique(target: &mut Vec<String>, items: impl IntoIterator<Item = String>) {
    for item in items {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let key = normalize_for_dedupe(item);
        if !target.iter().any(|existing| normalize_for_dedupe(existing) == key) {
            target.push(item.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_for_dedupe() {
        assert_eq!(
            normalize_for_dedupe("  Attention, is ALL you need! "),
            "attention is all you need"
        );
    }

    #[test]
    fn test_extend_unique_skips_near_duplicates() {
        let mut themes = vec!["Self-attention".to_string()];
        extend_unique(
            &mut themes,
            vec![
                "self attention".to_string(),
                "".to_string(),
                "Scaling laws".to_string(),
                "scaling laws.".to_string(),
            ],
        );
        assert_eq!(themes, vec!["Self-attention", "Scaling laws"]);
    }

    #[derive(Debug, Deserialize)]
    struct Lists {
        #[serde(default, deserialize_with = "null_as_default")]
        items: Vec<String>,
        #[serde(default, deserialize_with = "null_as_default")]
        label: String,
    }

    #[test]
    fn test_null_fields_read_as_default() {
        let lists: Lists = serde_json::from_str(r#"{"items": null, "label": null}"#).unwrap();
        assert!(lists.items.is_empty());
        assert!(lists.label.is_empty());

        let lists: Lists = serde_json::from_str(r#"{"items": ["a"]}"#).unwrap();
        assert_eq!(lists.items, vec!["a"]);
    }

    #[test]
    fn test_agent_kind_display() {
        assert_eq!(AgentKind::Citation.to_string(), "citation");
    }
}
