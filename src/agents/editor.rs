//! Editor Agent
//!
//! Runs once, after the final review. The model contributes a title and an
//! introduction; the document itself is assembled here so the cited section
//! text reaches the output byte for byte.

use super::prompts::{editor_prompt, EDITOR_SYSTEM};
use super::{null_as_default, AgentKind, EssayAgent};
use crate::llm::{ModelCall, ModelInvoker};
use crate::state::{Citation, EssayState, StateDelta};
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

const TEMPERATURE: f32 = 0.5;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EditorResponse {
    #[serde(deserialize_with = "null_as_default")]
    title: String,
    #[serde(deserialize_with = "null_as_default")]
    introduction: String,
}

pub struct EditorAgent {
    invoker: ModelInvoker,
}

impl EditorAgent {
    pub fn new(invoker: ModelInvoker) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl EssayAgent for EditorAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Editor
    }

    async fn run(&self, state: &EssayState) -> AppResult<StateDelta> {
        let outline = state
            .outline
            .as_ref()
            .ok_or_else(|| AppError::Internal("editing requires an outline".to_string()))?;

        let call = ModelCall::new(
            "editor",
            EDITOR_SYSTEM,
            editor_prompt(&state.topic, outline, &state.compiled_draft()),
        )
        .temperature(TEMPERATURE);
        let response: EditorResponse = self.invoker.invoke_json(&call).await?;

        let title = match response.title.trim() {
            "" => outline.title.as_str(),
            title => title,
        };
        let introduction = response.introduction.trim();
        if introduction.is_empty() {
            warn!("Editor returned no introduction");
        }

        let essay = assemble_essay(state, title, introduction)?;
        info!(
            title = %title,
            words = essay.split_whitespace().count(),
            references = state.citations.len(),
            "Essay assembled"
        );

        Ok(StateDelta {
            final_essay: Some(essay),
            ..Default::default()
        })
    }
}

/// Title, introduction, every outline section in order, then references
pub fn assemble_essay(state: &EssayState, title: &str, introduction: &str) -> AppResult<String> {
    let outline = state
        .outline
        .as_ref()
        .ok_or_else(|| AppError::Internal("editing requires an outline".to_string()))?;

    let mut parts = vec![format!("# {}", title.trim_start_matches('#').trim())];
    if !introduction.is_empty() {
        parts.push(introduction.to_string());
    }

    for planned in &outline.sections {
        let section = state.section(&planned.id).ok_or_else(|| {
            AppError::Internal(format!("section {} was never drafted", planned.id))
        })?;
        parts.push(format!("## {}\n\n{}", planned.title, section.text.trim()));
    }

    parts.push(format!("## References\n\n{}", bibliography(&state.citations)));
    Ok(format!("{}\n", parts.join("\n\n")))
}

/// One entry per distinct work, sorted by author then year
pub fn bibliography(citations: &[Citation]) -> String {
    let mut entries: Vec<(String, String, String)> = Vec::new();
    for citation in citations {
        let entry = (citation.author.clone(), citation.year.clone(), citation.title.clone());
        if !entries.contains(&entry) {
            entries.push(entry);
        }
    }
    if entries.is_empty() {
        return "No sources were cited.".to_string();
    }

    entries.sort_by(|a, b| {
        a.0.to_lowercase()
            .cmp(&b.0.to_lowercase())
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.2.cmp(&b.2))
    });
    entries
        .iter()
        .map(|(author, year, title)| format!("- {} ({}). *{}*.", author, year, title.trim_end_matches('.')))
        .collect::<Vec<_>>()
        .join("\n")
}
