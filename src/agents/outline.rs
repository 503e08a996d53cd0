//! Outline Agent
//!
//! Plans the essay in two steps: a first outline from the topic and criteria
//! alone, then a refinement that folds in the research notes. The result gets
//! stable section ids and is never revised afterwards.

use super::prompts::{initial_outline_prompt, outline_refinement_prompt, OUTLINE_SYSTEM};
use super::{null_as_default, AgentKind, EssayAgent};
use crate::llm::{ModelCall, ModelInvoker};
use crate::state::{EssayState, Outline, OutlineSection, ResearchNotes, StateDelta};
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

const TEMPERATURE: f32 = 0.5;

#[derive(Debug, Deserialize)]
struct OutlineResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    sections: Vec<SectionRaw>,
}

#[derive(Debug, Deserialize)]
struct SectionRaw {
    #[serde(default, deserialize_with = "null_as_default")]
    title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    description: String,
    /// Models emit numbers, numeric strings or nothing at all
    #[serde(default)]
    target_words: Option<Value>,
}

impl SectionRaw {
    fn word_target(&self) -> Option<u32> {
        match self.target_words.as_ref()? {
            Value::Number(n) => n.as_f64().filter(|v| *v >= 1.0).map(|v| v.round() as u32),
            Value::String(s) => s.trim().parse::<u32>().ok().filter(|v| *v > 0),
            _ => None,
        }
    }
}

pub struct OutlineAgent {
    invoker: ModelInvoker,
    target_length: u32,
}

impl OutlineAgent {
    pub fn new(invoker: ModelInvoker, target_length: u32) -> Self {
        Self {
            invoker,
            target_length,
        }
    }

    async fn initial(&self, state: &EssayState) -> AppResult<Outline> {
        let call = ModelCall::new(
            "outline",
            OUTLINE_SYSTEM,
            initial_outline_prompt(&state.topic, &state.criteria, self.target_length),
        )
        .temperature(TEMPERATURE);

        let response: OutlineResponse = self.invoker.invoke_json(&call).await?;
        if response.sections.is_empty() {
            return Err(AppError::malformed("outline", "the outline has no sections"));
        }
        Ok(normalize_outline(response, &state.topic, self.target_length))
    }

    async fn refine(&self, state: &EssayState, initial: Outline, notes: &ResearchNotes) -> AppResult<Outline> {
        let call = ModelCall::new(
            "outline refinement",
            OUTLINE_SYSTEM,
            outline_refinement_prompt(
                &state.topic,
                &state.criteria,
                &initial,
                notes,
                self.target_length,
            ),
        )
        .temperature(TEMPERATURE);

        let response: OutlineResponse = self.invoker.invoke_json(&call).await?;
        if response.sections.is_empty() {
            warn!("Outline refinement returned no sections, keeping the initial outline");
            return Ok(initial);
        }

        let mut refined = normalize_outline(response, &state.topic, self.target_length);
        if refined.title.is_empty() || refined.title == state.topic {
            refined.title = initial.title;
        }
        Ok(refined)
    }
}

#[async_trait]
impl EssayAgent for OutlineAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Outline
    }

    async fn run(&self, state: &EssayState) -> AppResult<StateDelta> {
        let initial = self.initial(state).await?;
        info!(sections = initial.sections.len(), "Initial outline drafted");

        let outline = match &state.research_notes {
            Some(notes) if !notes.is_empty() => self.refine(state, initial, notes).await?,
            _ => initial,
        };

        info!(
            title = %outline.title,
            sections = outline.sections.len(),
            planned_words = outline.sections.iter().map(|s| s.target_words).sum::<u32>(),
            "Outline complete"
        );

        Ok(StateDelta {
            outline: Some(outline),
            ..Default::default()
        })
    }
}

/// Assign ids in order, fill blank titles and missing word targets
fn normalize_outline(response: OutlineResponse, topic: &str, target_length: u32) -> Outline {
    let count = response.sections.len().max(1) as u32;
    let even_share = (target_length / count).max(1);

    let sections = response
        .sections
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let title = raw.title.trim();
            OutlineSection {
                id: format!("s{:02}", i + 1),
                title: if title.is_empty() {
                    format!("Section {}", i + 1)
                } else {
                    title.to_string()
                },
                description: raw.description.trim().to_string(),
                target_words: raw.word_target().unwrap_or(even_share),
            }
        })
        .collect();

    let title = response.title.trim();
    Outline {
        title: if title.is_empty() {
            topic.to_string()
        } else {
            title.to_string()
        },
        sections,
    }
}
