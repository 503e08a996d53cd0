//! Citation Agent
//!
//! Attributes claims in the draft to literature chunks and inserts inline
//! `[Author, Year]` markers. The model only proposes attributions; a proposal
//! is kept when its chunk id is real and its claim text is found verbatim in
//! the section. Citations are rebuilt from a marker-free draft on every pass.
//!
//! Each call sees a catalogue of chunk excerpts trimmed to a token budget:
//! chunks quoted during research first, then those sharing the most words
//! with the section.

use super::prompts::{catalogue_entry, citation_prompt, CITATION_SYSTEM};
use super::{null_as_default, AgentKind, EssayAgent};
use crate::documents::{estimate_tokens, ChunkId, LiteratureChunk, SourceDocument};
use crate::llm::{ModelCall, ModelInvoker};
use crate::state::{Citation, DraftSection, EssayState, ResearchNotes, StateDelta};
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;
use std::collections::HashSet;
use std::ops::Range;
use tracing::{debug, info, warn};

const TEMPERATURE: f32 = 0.3;
/// Shorter "claims" match too easily to be meaningful
const MIN_CLAIM_CHARS: usize = 12;
const NO_YEAR: &str = "n.d.";
const MIN_OVERLAP_WORD_CHARS: usize = 4;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CitationResponse {
    #[serde(deserialize_with = "null_as_default")]
    citations: Vec<ProposalRaw>,
}

#[derive(Debug, Deserialize)]
struct ProposalRaw {
    #[serde(default, deserialize_with = "null_as_default")]
    claim: String,
    /// Null when the model found no supporting chunk
    #[serde(default, deserialize_with = "null_as_default")]
    chunk_id: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    year: Option<serde_json::Value>,
}

/// A rendered catalogue line with what is needed to rank it
struct CatalogueEntry<'a> {
    chunk: &'a LiteratureChunk,
    text: String,
    tokens: usize,
    words: HashSet<String>,
}

pub struct CitationAgent {
    invoker: ModelInvoker,
    catalogue_tokens: usize,
}

impl CitationAgent {
    pub fn new(invoker: ModelInvoker, catalogue_tokens: usize) -> Self {
        Self {
            invoker,
            catalogue_tokens: catalogue_tokens.max(1),
        }
    }

    async fn cite_section(
        &self,
        state: &EssayState,
        section: &DraftSection,
        entries: &[CatalogueEntry<'_>],
    ) -> AppResult<(DraftSection, Vec<Citation>)> {
        let clean_text = strip_citation_markers(&section.text);
        let selected = select_catalogue(
            entries,
            state.research_notes.as_ref(),
            &clean_text,
            self.catalogue_tokens,
        );
        if selected.is_empty() {
            warn!(
                section = %section.section_id,
                budget = self.catalogue_tokens,
                "No catalogue entry fits the token budget"
            );
        } else if selected.len() < entries.len() {
            debug!(
                section = %section.section_id,
                kept = selected.len(),
                dropped = entries.len() - selected.len(),
                "Catalogue trimmed to token budget"
            );
        }
        let catalogue = selected
            .iter()
            .map(|entry| entry.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let call = ModelCall::new(
            format!("citation {}", section.section_id),
            CITATION_SYSTEM,
            citation_prompt(&section.title, &clean_text, &catalogue),
        )
        .temperature(TEMPERATURE);

        let response: CitationResponse = self.invoker.invoke_json(&call).await?;
        let proposed = response.citations.len();
        let (text, citations) = apply_proposals(state, &section.section_id, clean_text, response.citations);

        debug!(
            section = %section.section_id,
            proposed,
            accepted = citations.len(),
            "Section cited"
        );
        Ok((
            DraftSection {
                section_id: section.section_id.clone(),
                title: section.title.clone(),
                text,
            },
            citations,
        ))
    }
}

#[async_trait]
impl EssayAgent for CitationAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Citation
    }

    async fn run(&self, state: &EssayState) -> AppResult<StateDelta> {
        if state.sections.is_empty() {
            return Err(AppError::Internal("nothing to cite: the draft is empty".to_string()));
        }

        let entries = catalogue_entries(state);
        let cited = try_join_all(
            state
                .sections
                .iter()
                .map(|section| self.cite_section(state, section, &entries)),
        )
        .await?;

        let mut sections = Vec::with_capacity(cited.len());
        let mut citations: Vec<Citation> = Vec::new();
        for (section, section_citations) in cited {
            sections.push(section);
            for citation in section_citations {
                if !citations.contains(&citation) {
                    citations.push(citation);
                }
            }
        }

        info!(citations = citations.len(), "Citations attached");
        Ok(StateDelta {
            sections: Some(sections),
            citations: Some(citations),
            ..Default::default()
        })
    }
}

fn describe_source(source: Option<&SourceDocument>, source_id: &str) -> String {
    let Some(source) = source else {
        return source_id.to_string();
    };
    let mut description = source.display_title().to_string();
    if let Some(author) = &source.author {
        description.push_str(&format!(" by {}", author));
    }
    if let Some(year) = &source.year {
        description.push_str(&format!(" ({})", year));
    }
    description
}

fn catalogue_entries(state: &EssayState) -> Vec<CatalogueEntry<'_>> {
    state
        .literature_chunks
        .iter()
        .map(|chunk| {
            let source = describe_source(state.source(&chunk.source_id), &chunk.source_id);
            let text = catalogue_entry(chunk, &source);
            CatalogueEntry {
                chunk,
                tokens: estimate_tokens(&text).max(1),
                text,
                words: content_words(&chunk.text),
            }
        })
        .collect()
}

/// Rank entries for one section and keep as many as fit in `budget` tokens.
///
/// Quoted chunks rank first, then word overlap with the section; ties keep
/// literature order.
fn select_catalogue<'a, 'b>(
    entries: &'a [CatalogueEntry<'b>],
    notes: Option<&ResearchNotes>,
    section_text: &str,
    budget: usize,
) -> Vec<&'a CatalogueEntry<'b>> {
    let quoted: HashSet<&ChunkId> = notes
        .map(|n| n.quotes.iter().filter_map(|q| q.chunk_id.as_ref()).collect())
        .unwrap_or_default();
    let section_words = content_words(section_text);

    let mut ranked: Vec<(bool, usize, usize)> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let overlap = entry.words.intersection(&section_words).count();
            (quoted.contains(&entry.chunk.id), overlap, i)
        })
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));

    let mut used = 0;
    let mut selected = Vec::new();
    for (_, _, i) in ranked {
        let entry = &entries[i];
        if used + entry.tokens > budget {
            continue;
        }
        used += entry.tokens;
        selected.push(entry);
    }
    selected
}

fn content_words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= MIN_OVERLAP_WORD_CHARS)
        .map(str::to_lowercase)
        .collect()
}

/// First occurrence of `claim` in `text` that does not start or end inside a word
fn find_claim(text: &str, claim: &str) -> Option<usize> {
    let splits_word = |edge: Option<char>, neighbour: Option<char>| {
        edge.is_some_and(char::is_alphanumeric) && neighbour.is_some_and(char::is_alphanumeric)
    };

    text.match_indices(claim).map(|(i, _)| i).find(|&i| {
        let before = text[..i].chars().next_back();
        let after = text[i + claim.len()..].chars().next();
        !splits_word(claim.chars().next(), before) && !splits_word(claim.chars().next_back(), after)
    })
}

/// Validate proposals against the state and insert markers into `text`
fn apply_proposals(
    state: &EssayState,
    section_id: &str,
    mut text: String,
    proposals: Vec<ProposalRaw>,
) -> (String, Vec<Citation>) {
    let mut citations = Vec::new();

    for proposal in proposals {
        if proposal.chunk_id.trim().is_empty() {
            debug!(section = section_id, "No chunk id proposed, claim left uncited");
            continue;
        }
        let chunk_id = ChunkId::from(proposal.chunk_id.as_str());
        let Some(chunk) = state.chunk(&chunk_id) else {
            debug!(section = section_id, chunk_id = %chunk_id, "Unknown chunk id, claim left uncited");
            continue;
        };

        let claim = proposal
            .claim
            .trim()
            .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'))
            .trim();
        if claim.chars().count() < MIN_CLAIM_CHARS {
            debug!(section = section_id, "Claim too short to attribute");
            continue;
        }
        let Some(position) = find_claim(&text, claim) else {
            debug!(section = section_id, claim, "Claim not found in section, left uncited");
            continue;
        };
        let source = state.source(&chunk.source_id);
        let model_year = proposal.year.as_ref().and_then(year_from_value);
        let citation = Citation {
            author: source
                .and_then(|s| s.author.as_deref())
                .and_then(primary_surname)
                .or_else(|| proposal.author.as_deref().and_then(primary_surname))
                .unwrap_or_else(|| fallback_author(&chunk.source_id, source)),
            year: source
                .and_then(|s| s.year.clone())
                .or(model_year)
                .unwrap_or_else(|| NO_YEAR.to_string()),
            title: source
                .map(|s| s.display_title().to_string())
                .unwrap_or_else(|| chunk.source_id.clone()),
            source_id: chunk.source_id.clone(),
            chunk_id: chunk.id.clone(),
        };

        let marker = citation.marker();
        let claim_end = position + claim.len();
        let mut insert_at = claim_end;
        let mut duplicate = false;
        // Stack after markers already attached to this claim
        for range in citation_markers(&text[claim_end..]) {
            if !text[insert_at..claim_end + range.start].trim().is_empty() {
                break;
            }
            if text[claim_end + range.start..claim_end + range.end] == marker {
                duplicate = true;
                break;
            }
            insert_at = claim_end + range.end;
        }
        if duplicate {
            continue;
        }

        text.insert_str(insert_at, &format!(" {}", marker));
        citations.push(citation);
    }

    (text, citations)
}

/// Byte ranges of every `[Author, Year]` marker in `text`
pub fn citation_markers(text: &str) -> Vec<Range<usize>> {
    let mut markers = Vec::new();
    let mut offset = 0;

    while let Some(open) = text[offset..].find('[') {
        let start = offset + open;
        let Some(close) = text[start + 1..].find(']') else {
            break;
        };
        let end = start + 1 + close + 1;
        let inner = &text[start + 1..end - 1];

        if is_marker_body(inner) {
            markers.push(start..end);
            offset = end;
        } else {
            offset = start + 1;
        }
    }
    markers
}

fn is_marker_body(inner: &str) -> bool {
    let Some((author, year)) = inner.rsplit_once(", ") else {
        return false;
    };
    let author = author.trim();
    if author.is_empty() || author.contains('[') {
        return false;
    }
    let year = year.trim();
    if year == NO_YEAR {
        return true;
    }
    let digits: String = year.chars().take_while(|c| c.is_ascii_digit()).collect();
    let suffix = &year[digits.len()..];
    digits.len() == 4 && (suffix.is_empty() || (suffix.len() == 1 && suffix.chars().all(|c| c.is_ascii_lowercase())))
}

/// Remove every inline marker together with the space before it
pub fn strip_citation_markers(text: &str) -> String {
    let mut result = text.to_string();
    for range in citation_markers(text).into_iter().rev() {
        let start = if result[..range.start].ends_with(' ') {
            range.start - 1
        } else {
            range.start
        };
        result.replace_range(start..range.end, "");
    }
    result
}

/// Reduce an author field to the first author's surname
fn primary_surname(raw: &str) -> Option<String> {
    let without_etal = match raw.find("et al").or_else(|| raw.find("Et al")) {
        Some(i) => &raw[..i],
        None => raw,
    };

    let first_author = without_etal
        .split([';', '&'])
        .next()
        .unwrap_or(without_etal)
        .split(" and ")
        .next()
        .unwrap_or(without_etal)
        .trim();

    // "Surname, Given" or "Given Surname"
    let surname = match first_author.split_once(',') {
        Some((surname, _)) => surname.trim(),
        None => first_author.split_whitespace().last().unwrap_or(""),
    };
    let surname = surname.trim_matches(|c: char| !c.is_alphanumeric());
    if surname.is_empty() {
        None
    } else {
        Some(surname.to_string())
    }
}

fn year_from_value(value: &serde_json::Value) -> Option<String> {
    let text = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => return None,
    };
    let chars: Vec<char> = text.chars().collect();
    chars
        .windows(4)
        .find(|w| w.iter().all(|c| c.is_ascii_digit()) && matches!(w[0], '1' | '2'))
        .map(|w| w.iter().collect())
}

fn fallback_author(source_id: &str, source: Option<&SourceDocument>) -> String {
    match source {
        Some(source) => source.stem().to_string(),
        None => source_id.to_string(),
    }
}
