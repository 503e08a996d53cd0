//! Shared essay state
//!
//! `EssayState` is owned by the workflow engine. Agents only ever see it by
//! shared reference and hand back a [`StateDelta`]; the engine merges the delta
//! field by field. A field an agent did not compute stays `None` in its delta
//! and therefore cannot be erased.

use crate::documents::{ChunkId, LiteratureChunk, SourceDocument};
use crate::types::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// A quote lifted from the literature, attributed to the chunk it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<ChunkId>,
}

/// Research findings distilled from every literature chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchNotes {
    pub themes: Vec<String>,
    pub key_arguments: Vec<String>,
    pub quotes: Vec<Quote>,
    pub findings: Vec<String>,
    pub gaps: Vec<String>,
}

impl ResearchNotes {
    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
            && self.key_arguments.is_empty()
            && self.quotes.is_empty()
            && self.findings.is_empty()
            && self.gaps.is_empty()
    }
}

/// One planned section of the essay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineSection {
    /// Stable identifier, assigned in outline order (`s01`, `s02`, ...)
    pub id: String,
    pub title: String,
    pub description: String,
    pub target_words: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub title: String,
    pub sections: Vec<OutlineSection>,
}

impl Outline {
    pub fn section_ids(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.id.as_str()).collect()
    }
}

/// Drafted text for one outline section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSection {
    pub section_id: String,
    pub title: String,
    pub text: String,
}

/// One attributed source use. Rendered inline as `[Author, Year]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    pub author: String,
    pub year: String,
    pub title: String,
    pub source_id: String,
    pub chunk_id: ChunkId,
}

impl Citation {
    pub fn marker(&self) -> String {
        format!("[{}, {}]", self.author, self.year)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewFeedback {
    /// Holistic grade in [0.0, 1.0]
    pub score: f64,
    /// Deficiencies the next writing pass must address
    pub comments: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EssayState {
    pub topic: String,
    pub criteria: String,
    pub literature_chunks: Vec<LiteratureChunk>,
    pub sources: Vec<SourceDocument>,
    pub research_notes: Option<ResearchNotes>,
    pub outline: Option<Outline>,
    pub sections: Vec<DraftSection>,
    pub citations: Vec<Citation>,
    pub review_feedback: Option<ReviewFeedback>,
    revision_count: u32,
    pub final_essay: Option<String>,
}

/// Fields an agent computed. `None` means "leave untouched".
#[derive(Debug, Clone, Default)]
pub struct StateDelta {
    pub research_notes: Option<ResearchNotes>,
    pub outline: Option<Outline>,
    pub sections: Option<Vec<DraftSection>>,
    pub citations: Option<Vec<Citation>>,
    pub review_feedback: Option<ReviewFeedback>,
    pub final_essay: Option<String>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.research_notes.is_none()
            && self.outline.is_none()
            && self.sections.is_none()
            && self.citations.is_none()
            && self.review_feedback.is_none()
            && self.final_essay.is_none()
    }
}

impl EssayState {
    pub fn new(
        topic: impl Into<String>,
        criteria: impl Into<String>,
        literature_chunks: Vec<LiteratureChunk>,
        sources: Vec<SourceDocument>,
    ) -> AppResult<Self> {
        if literature_chunks.is_empty() {
            return Err(AppError::Input(
                "An essay run needs at least one literature chunk".to_string(),
            ));
        }

        Ok(Self {
            topic: topic.into(),
            criteria: criteria.into(),
            literature_chunks,
            sources,
            research_notes: None,
            outline: None,
            sections: Vec::new(),
            citations: Vec::new(),
            review_feedback: None,
            revision_count: 0,
            final_essay: None,
        })
    }

    pub fn revision_count(&self) -> u32 {
        self.revision_count
    }

    /// Record one loop-back from review to writing. Only the engine calls this.
    pub(crate) fn begin_revision(&mut self) {
        self.revision_count += 1;
    }

    pub fn review_score(&self) -> Option<f64> {
        self.review_feedback.as_ref().map(|f| f.score)
    }

    pub fn section(&self, section_id: &str) -> Option<&DraftSection> {
        self.sections.iter().find(|s| s.section_id == section_id)
    }

    pub fn chunk(&self, id: &ChunkId) -> Option<&LiteratureChunk> {
        self.literature_chunks.iter().find(|c| &c.id == id)
    }

    pub fn source(&self, source_id: &str) -> Option<&SourceDocument> {
        self.sources.iter().find(|s| s.id == source_id)
    }

    /// Sections joined under their headings, in draft order
    pub fn compiled_draft(&self) -> String {
        self.sections
            .iter()
            .map(|s| format!("## {}\n\n{}", s.title, s.text.trim()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn word_count(&self) -> usize {
        self.sections
            .iter()
            .map(|s| s.text.split_whitespace().count())
            .sum()
    }

    /// Merge an agent's delta into the state, field by field
    pub fn apply(&mut self, delta: StateDelta) -> AppResult<()> {
        if let Some(notes) = delta.research_notes {
            if self.research_notes.is_some() {
                return Err(AppError::Internal(
                    "research notes were already produced".to_string(),
                ));
            }
            self.research_notes = Some(notes);
        }

        if let Some(outline) = delta.outline {
            if self.outline.is_some() {
                return Err(AppError::Internal(
                    "the outline is fixed once produced".to_string(),
                ));
            }
            self.outline = Some(outline);
        }

        if let Some(sections) = delta.sections {
            self.check_sections_follow_outline(&sections)?;
            self.sections = sections;
        }

        if let Some(citations) = delta.citations {
            self.citations = citations;
        }

        if let Some(feedback) = delta.review_feedback {
            self.review_feedback = Some(feedback);
        }

        if let Some(essay) = delta.final_essay {
            if self.final_essay.is_some() {
                return Err(AppError::Internal(
                    "the final essay was already produced".to_string(),
                ));
            }
            self.final_essay = Some(essay);
        }

        Ok(())
    }

    fn check_sections_follow_outline(&self, sections: &[DraftSection]) -> AppResult<()> {
        let outline = self.outline.as_ref().ok_or_else(|| {
            AppError::Internal("sections were drafted before an outline existed".to_string())
        })?;

        let drafted: Vec<&str> = sections.iter().map(|s| s.section_id.as_str()).collect();
        if drafted != outline.section_ids() {
            return Err(AppError::Internal(format!(
                "drafted sections {:?} do not match the outline {:?}",
                drafted,
                outline.section_ids()
            )));
        }
        Ok(())
    }
}
