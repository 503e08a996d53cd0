//! Research Agent
//!
//! Reads every literature chunk in batches and distills themes, arguments,
//! attributed quotes, findings and gaps. Batches are independent model calls
//! awaited together; their extractions are merged in batch order.

use super::prompts::{research_prompt, RESEARCH_SYSTEM};
use super::{extend_unique, normalize_for_dedupe, null_as_default, AgentKind, EssayAgent};
use crate::documents::{ChunkId, LiteratureChunk};
use crate::llm::{ModelCall, ModelInvoker};
use crate::state::{EssayState, Quote, ResearchNotes, StateDelta};
use crate::types::AppResult;
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

const TEMPERATURE: f32 = 0.3;

/// Raw JSON response from the model for one batch
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExtractionResponse {
    #[serde(deserialize_with = "null_as_default")]
    themes: Vec<String>,
    #[serde(alias = "key_arguments", deserialize_with = "null_as_default")]
    arguments: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    quotes: Vec<QuoteRaw>,
    #[serde(deserialize_with = "null_as_default")]
    findings: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    gaps: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuoteRaw {
    Attributed {
        #[serde(default, deserialize_with = "null_as_default")]
        text: String,
        #[serde(default)]
        chunk_id: Option<String>,
    },
    Plain(String),
}

pub struct ResearchAgent {
    invoker: ModelInvoker,
    chunks_per_batch: usize,
}

impl ResearchAgent {
    pub fn new(invoker: ModelInvoker, chunks_per_batch: usize) -> Self {
        Self {
            invoker,
            chunks_per_batch: chunks_per_batch.max(1),
        }
    }

    async fn extract(
        &self,
        batch_index: usize,
        topic: &str,
        criteria: &str,
        batch: &[LiteratureChunk],
    ) -> AppResult<ExtractionResponse> {
        let call = ModelCall::new(
            format!("research batch {}", batch_index + 1),
            RESEARCH_SYSTEM,
            research_prompt(topic, criteria, batch),
        )
        .temperature(TEMPERATURE);

        let response: ExtractionResponse = self.invoker.invoke_json(&call).await?;
        debug!(
            batch = batch_index + 1,
            themes = response.themes.len(),
            quotes = response.quotes.len(),
            "Research batch extracted"
        );
        Ok(response)
    }
}

#[async_trait]
impl EssayAgent for ResearchAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Research
    }

    async fn run(&self, state: &EssayState) -> AppResult<StateDelta> {
        let batches: Vec<&[LiteratureChunk]> =
            state.literature_chunks.chunks(self.chunks_per_batch).collect();
        info!(
            chunks = state.literature_chunks.len(),
            batches = batches.len(),
            "Analyzing literature"
        );

        let extractions = try_join_all(
            batches
                .iter()
                .enumerate()
                .map(|(i, batch)| self.extract(i, &state.topic, &state.criteria, batch)),
        )
        .await?;

        let mut notes = ResearchNotes::default();
        for (batch, extraction) in batches.iter().zip(extractions) {
            merge_extraction(&mut notes, batch, extraction);
        }

        if notes.is_empty() {
            warn!("Research produced no notes; the outline will rely on topic and criteria alone");
        }
        info!(
            themes = notes.themes.len(),
            arguments = notes.key_arguments.len(),
            quotes = notes.quotes.len(),
            "Research complete"
        );

        Ok(StateDelta {
            research_notes: Some(notes),
            ..Default::default()
        })
    }
}

fn merge_extraction(notes: &mut ResearchNotes, batch: &[LiteratureChunk], extraction: ExtractionResponse) {
    extend_unique(&mut notes.themes, extraction.themes);
    extend_unique(&mut notes.key_arguments, extraction.arguments);
    extend_unique(&mut notes.findings, extraction.findings);
    extend_unique(&mut notes.gaps, extraction.gaps);

    let batch_ids: HashSet<&ChunkId> = batch.iter().map(|c| &c.id).collect();
    let mut seen: HashSet<String> = notes
        .quotes
        .iter()
        .map(|q| normalize_for_dedupe(&q.text))
        .collect();

    for raw in extraction.quotes {
        let (text, chunk_id) = match raw {
            QuoteRaw::Attributed { text, chunk_id } => (text, chunk_id),
            QuoteRaw::Plain(text) => (text, None),
        };
        let text = text.trim().to_string();
        if text.is_empty() || !seen.insert(normalize_for_dedupe(&text)) {
            continue;
        }

        let chunk_id = chunk_id.map(|id| ChunkId::from(id.as_str())).filter(|id| {
            let known = batch_ids.contains(id);
            if !known {
                debug!(chunk_id = %id, "Dropping quote attribution outside the batch");
            }
            known
        });
        notes.quotes.push(Quote { text, chunk_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> Vec<LiteratureChunk> {
        vec![
            LiteratureChunk::new("a.pdf", 0, "Attention replaces recurrence."),
            LiteratureChunk::new("a.pdf", 1, "Training is parallel."),
        ]
    }

    fn parse(json: &str) -> ExtractionResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_extraction_tolerates_missing_fields_and_plain_quotes() {
        let extraction = parse(r#"{"themes": ["attention"], "quotes": ["plain quote"]}"#);
        let mut notes = ResearchNotes::default();
        merge_extraction(&mut notes, &batch(), extraction);

        assert_eq!(notes.themes, vec!["attention"]);
        assert_eq!(notes.quotes[0].text, "plain quote");
        assert!(notes.quotes[0].chunk_id.is_none());
        assert!(notes.key_arguments.is_empty());
    }

    #[test]
    fn test_merge_dedupes_quotes_across_batches() {
        let mut notes = ResearchNotes::default();
        merge_extraction(
            &mut notes,
            &batch(),
            parse(r#"{"quotes": [{"text": "Attention is all you need.", "chunk_id": "a.pdf#0"}]}"#),
        );
        merge_extraction(
            &mut notes,
            &batch(),
            parse(r#"{"quotes": [{"text": "attention is ALL you need", "chunk_id": "a.pdf#1"}]}"#),
        );

        assert_eq!(notes.quotes.len(), 1);
        assert_eq!(notes.quotes[0].chunk_id, Some(ChunkId::new("a.pdf", 0)));
    }

    #[test]
    fn test_attribution_outside_batch_is_dropped() {
        let mut notes = ResearchNotes::default();
        merge_extraction(
            &mut notes,
            &batch(),
            parse(r#"{"quotes": [{"text": "Invented.", "chunk_id": "b.pdf#7"}]}"#),
        );

        assert_eq!(notes.quotes.len(), 1);
        assert!(notes.quotes[0].chunk_id.is_none());
    }

    #[test]
    fn test_empty_extraction_contributes_nothing() {
        let mut notes = ResearchNotes::default();
        merge_extraction(&mut notes, &batch(), parse("{}"));
        assert!(notes.is_empty());
    }

    #[test]
    fn test_null_fields_are_an_empty_extraction() {
        let extraction = parse(
            r#"{"themes": ["a"], "arguments": null, "quotes": null, "findings": null, "gaps": null}"#,
        );
        let mut notes = ResearchNotes::default();
        merge_extraction(&mut notes, &batch(), extraction);

        assert_eq!(notes.themes, vec!["a"]);
        assert!(notes.quotes.is_empty());
        assert!(notes.gaps.is_empty());
    }

    #[test]
    fn test_quote_with_null_text_is_skipped() {
        let mut notes = ResearchNotes::default();
        merge_extraction(
            &mut notes,
            &batch(),
            parse(r#"{"quotes": [{"text": null, "chunk_id": "a.pdf#0"}]}"#),
        );
        assert!(notes.quotes.is_empty());
    }

    #[test]
    fn test_key_arguments_alias() {
        let extraction = parse(r#"{"key_arguments": ["Scale matters"]}"#);
        assert_eq!(extraction.arguments, vec!["Scale matters"]);
    }
}
