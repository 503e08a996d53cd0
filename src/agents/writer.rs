//! Writer Agent
//!
//! Drafts every outline section with one model call each. On a revision pass
//! every section is regenerated from scratch with the reviewer's deficiencies
//! in the prompt; nothing from the previous draft is carried over.

use super::prompts::{writer_prompt, WRITER_SYSTEM};
use super::{AgentKind, EssayAgent};
use crate::llm::{ModelCall, ModelInvoker};
use crate::state::{DraftSection, EssayState, Outline, OutlineSection, ResearchNotes, StateDelta};
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, info};

const TEMPERATURE: f32 = 0.7;

pub struct WriterAgent {
    invoker: ModelInvoker,
}

impl WriterAgent {
    pub fn new(invoker: ModelInvoker) -> Self {
        Self { invoker }
    }

    async fn write_section(
        &self,
        state: &EssayState,
        outline: &Outline,
        section: &OutlineSection,
        notes: &ResearchNotes,
        feedback: Option<&[String]>,
    ) -> AppResult<DraftSection> {
        let label = format!("writer {}", section.id);
        let call = ModelCall::new(
            label.clone(),
            WRITER_SYSTEM,
            writer_prompt(&state.topic, &state.criteria, outline, section, notes, feedback),
        )
        .temperature(TEMPERATURE)
        .max_tokens(section.target_words.saturating_mul(2).saturating_add(256));

        let raw = self.invoker.invoke_text(&call).await?;
        let text = clean_section_text(&raw, &section.title);
        if text.is_empty() {
            return Err(AppError::malformed(
                label,
                format!("empty text for section \"{}\"", section.title),
            ));
        }

        debug!(
            section = %section.id,
            words = text.split_whitespace().count(),
            target = section.target_words,
            "Section drafted"
        );
        Ok(DraftSection {
            section_id: section.id.clone(),
            title: section.title.clone(),
            text,
        })
    }
}

#[async_trait]
impl EssayAgent for WriterAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Writer
    }

    async fn run(&self, state: &EssayState) -> AppResult<StateDelta> {
        let outline = state
            .outline
            .as_ref()
            .ok_or_else(|| AppError::Internal("writing requires an outline".to_string()))?;
        let empty_notes = ResearchNotes::default();
        let notes = state.research_notes.as_ref().unwrap_or(&empty_notes);

        let feedback = if state.revision_count() > 0 {
            state.review_feedback.as_ref().map(|f| f.comments.as_slice())
        } else {
            None
        };

        info!(
            sections = outline.sections.len(),
            revision = state.revision_count(),
            addressing = feedback.map_or(0, |f| f.len()),
            "Writing draft"
        );

        let sections = try_join_all(
            outline
                .sections
                .iter()
                .map(|section| self.write_section(state, outline, section, notes, feedback)),
        )
        .await?;

        let words: usize = sections.iter().map(|s| s.text.split_whitespace().count()).sum();
        info!(words, "Draft complete");

        Ok(StateDelta {
            sections: Some(sections),
            citations: Some(Vec::new()),
            ..Default::default()
        })
    }
}

/// Trim the generation and drop a leading heading that repeats the section title
fn clean_section_text(raw: &str, title: &str) -> String {
    let trimmed = raw.trim();
    let mut lines = trimmed.lines();
    match lines.next() {
        Some(first) if is_heading_for(first, title) => lines.collect::<Vec<_>>().join("\n").trim().to_string(),
        _ => trimmed.to_string(),
    }
}

fn is_heading_for(line: &str, title: &str) -> bool {
    let line = line.trim();
    let stripped = line.trim_start_matches('#').trim().trim_matches('*').trim();
    line.starts_with('#') || stripped.eq_ignore_ascii_case(title.trim())
}
