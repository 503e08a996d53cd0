//! Literature directory loading
//!
//! One unreadable or empty file never aborts the run: it is logged and skipped.
//! Only an empty directory, or a directory that yields no usable chunk at all,
//! is an input error.

use super::chunker::chunk_source;
use super::{LiteratureChunk, SourceDocument};
use crate::config::ChunkingConfig;
use crate::types::{AppError, AppResult};
use lopdf::{Dictionary, Document, Object};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

/// Text and metadata pulled out of one file
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub text: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<String>,
}

/// Extracts text from a literature file
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> AppResult<ExtractedDocument>;
}

/// PDF through `lopdf`, plain text and Markdown read as UTF-8
pub struct DefaultExtractor;

impl TextExtractor for DefaultExtractor {
    fn extract(&self, path: &Path) -> AppResult<ExtractedDocument> {
        match extension_of(path).as_deref() {
            Some("pdf") => extract_pdf(path),
            _ => {
                let text = fs::read_to_string(path)?;
                Ok(ExtractedDocument {
                    text,
                    title: None,
                    author: None,
                    year: None,
                })
            }
        }
    }
}

/// Everything the pipeline needs from the literature directory
#[derive(Debug, Clone, Default)]
pub struct Literature {
    pub chunks: Vec<LiteratureChunk>,
    pub sources: Vec<SourceDocument>,
    /// Files that were skipped, with the reason
    pub skipped: Vec<(String, String)>,
}

/// Load, extract and chunk every supported file in `dir`, in file-name order
pub fn load_literature(
    dir: &Path,
    chunking: &ChunkingConfig,
    extractor: &dyn TextExtractor,
) -> AppResult<Literature> {
    if !dir.is_dir() {
        return Err(AppError::Input(format!(
            "Literature directory not found: {}",
            dir.display()
        )));
    }

    let files = list_literature_files(dir)?;
    if files.is_empty() {
        return Err(AppError::Input(format!(
            "No PDF, text or Markdown files found in {}",
            dir.display()
        )));
    }

    let mut literature = Literature::default();

    for path in files {
        let source_id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let extracted = match extractor.extract(&path) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(file = %source_id, error = %e, "Skipping unreadable literature file");
                literature.skipped.push((source_id, e.to_string()));
                continue;
            }
        };

        let chunks = chunk_source(
            &source_id,
            &extracted.text,
            chunking.chunk_size,
            chunking.chunk_overlap,
        );
        if chunks.is_empty() {
            warn!(file = %source_id, "Skipping literature file with no extractable text");
            literature
                .skipped
                .push((source_id, "no extractable text".to_string()));
            continue;
        }

        info!(file = %source_id, chunks = chunks.len(), "Loaded literature file");
        literature.sources.push(SourceDocument {
            id: source_id,
            title: extracted.title,
            author: extracted.author,
            year: extracted.year,
        });
        literature.chunks.extend(chunks);
    }

    if literature.chunks.is_empty() {
        return Err(AppError::Input(format!(
            "No usable text in any literature file under {} ({} skipped)",
            dir.display(),
            literature.skipped.len()
        )));
    }

    Ok(literature)
}

fn list_literature_files(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            extension_of(p)
                .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

fn extract_pdf(path: &Path) -> AppResult<ExtractedDocument> {
    let doc = Document::load(path)
        .map_err(|e| AppError::Input(format!("Failed to parse PDF {}: {}", path.display(), e)))?;

    let mut pages = Vec::new();
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => pages.push(text),
            Err(e) => debug!(page = page_number, error = %e, "Could not extract page text"),
        }
    }

    let info = info_dictionary(&doc);
    let field = |key: &[u8]| info.and_then(|dict| dict_string(dict, key));

    Ok(ExtractedDocument {
        text: pages.join("\n\n"),
        title: field(b"Title"),
        author: field(b"Author"),
        year: field(b"CreationDate").and_then(|d| pdf_date_year(&d)),
    })
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn dict_string(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::String(bytes, _) => {
            let value = decode_pdf_string(bytes);
            let value = value.trim();
            if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        }
        _ => None,
    }
}

/// PDF text strings are either UTF-16BE with a byte-order mark or byte strings
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Year of a PDF date string such as `D:20210314120000Z`
fn pdf_date_year(date: &str) -> Option<String> {
    let digits = date.trim_start_matches("D:");
    let year: String = digits.chars().take(4).collect();
    if year.len() == 4 && year.chars().all(|c| c.is_ascii_digit()) {
        Some(year)
    } else {
        None
    }
}
