// Token-window chunking of extracted literature text

use super::LiteratureChunk;

/// Rough characters-per-token ratio used to size windows without a tokenizer
pub const CHARS_PER_TOKEN: usize = 4;

/// Approximate token count of `text`
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

/// Collapse every whitespace run into one space and trim the ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split `text` into overlapping windows of roughly `chunk_size` tokens.
///
/// Windows overlap the previous one by roughly `chunk_overlap` tokens and end
/// on a sentence boundary when one sits in the last fifth of the window and
/// past its midpoint. The result depends only on the inputs.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    let chars: Vec<char> = normalized.chars().collect();
    let total = chars.len();
    if total == 0 || chunk_size == 0 {
        return Vec::new();
    }

    let window = chunk_size * CHARS_PER_TOKEN;
    let overlap = (chunk_overlap * CHARS_PER_TOKEN).min(window.saturating_sub(1));
    let boundary_zone = window / 5;

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let mut end = (start + window).min(total);

        if end < total {
            let search_from = end.saturating_sub(boundary_zone).max(start);
            let boundary = (search_from..end)
                .rev()
                .find(|&i| chars[i] == '.' || chars[i] == '\n');
            if let Some(i) = boundary {
                if i - start > window / 2 {
                    end = i + 1;
                }
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= total {
            break;
        }
        // Always make forward progress, even if the overlap would rewind past `start`
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

/// Chunk one source's text and tag every chunk with the source identifier
pub fn chunk_source(
    source_id: &str,
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<LiteratureChunk> {
    chunk_text(text, chunk_size, chunk_overlap)
        .into_iter()
        .enumerate()
        .map(|(index, text)| LiteratureChunk::new(source_id, index, text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_text() -> String {
        (0..200)
            .map(|i| format!("Claim {} holds here.", i))
            .collect::<Vec<_>>()
            .join("  \n ")
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_text("", 100, 10).is_empty());
        assert!(chunk_text("   \n\t ", 100, 10).is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunk_text("A short   passage.\nWith two lines.", 100, 10);
        assert_eq!(chunks, vec!["A short passage. With two lines.".to_string()]);
    }

    #[test]
    fn test_chunking_is_idempotent() {
        let text = sample_text();
        let first = chunk_text(&text, 50, 10);
        let second = chunk_text(&text, 50, 10);
        assert!(first.len() > 1);
        assert_eq!(first, second);

        let tagged_a = chunk_source("paper.pdf", &text, 50, 10);
        let tagged_b = chunk_source("paper.pdf", &text, 50, 10);
        assert_eq!(tagged_a, tagged_b);
    }

    #[test]
    fn test_chunks_respect_window_and_overlap() {
        let text = sample_text();
        let chunks = chunk_text(&text, 50, 10);
        let window = 50 * CHARS_PER_TOKEN;

        for chunk in &chunks {
            assert!(chunk.chars().count() <= window);
        }

        // Consecutive chunks share text because of the overlap
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().rev().take(20).collect::<Vec<_>>().into_iter().rev().collect();
            assert!(pair[1].contains(tail.trim()), "expected overlap between chunks");
        }
    }

    #[test]
    fn test_prefers_sentence_boundaries() {
        let text = sample_text();
        let chunks = chunk_text(&text, 50, 10);
        // Every chunk except the last ends on a full stop
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.ends_with('.'), "chunk did not end on a sentence: {}", chunk);
        }
    }

    #[test]
    fn test_chunk_ids_are_tagged_with_source() {
        let chunks = chunk_source("smith2020.pdf", &sample_text(), 50, 10);
        assert_eq!(chunks[0].id.as_str(), "smith2020.pdf#0");
        assert_eq!(chunks[1].index, 1);
        assert!(chunks.iter().all(|c| c.source_id == "smith2020.pdf"));
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }
}
