//! Literature ingestion
//!
//! Reads every supported file in the literature directory, extracts its text
//! and metadata, and cuts the text into overlapping chunks. Each chunk carries
//! the identifier of the file it came from so later stages can attribute
//! claims to real sources.

pub mod chunker;
pub mod loader;

pub use chunker::{chunk_source, chunk_text, estimate_tokens};
pub use loader::{load_literature, ExtractedDocument, Literature, TextExtractor, DefaultExtractor};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one chunk: `<source_id>#<index>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    pub fn new(source_id: &str, index: usize) -> Self {
        ChunkId(format!("{}#{}", source_id, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChunkId {
    fn from(s: &str) -> Self {
        ChunkId(s.trim().to_string())
    }
}

/// A bounded-size fragment of one literature file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteratureChunk {
    pub id: ChunkId,
    pub source_id: String,
    pub index: usize,
    pub text: String,
}

impl LiteratureChunk {
    pub fn new(source_id: &str, index: usize, text: impl Into<String>) -> Self {
        Self {
            id: ChunkId::new(source_id, index),
            source_id: source_id.to_string(),
            index,
            text: text.into(),
        }
    }
}

/// Bibliographic facts known about one literature file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// File name, unique within the literature directory
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
}

impl SourceDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            author: None,
            year: None,
        }
    }

    /// File name without its extension, used when no title is known
    pub fn stem(&self) -> &str {
        match self.id.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.id,
        }
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or_else(|| self.stem())
    }
}
