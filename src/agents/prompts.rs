//! Prompt templates for every agent in the essay pipeline

use crate::documents::LiteratureChunk;
use crate::state::{Outline, OutlineSection, ResearchNotes};

/// Longest chunk excerpt shown in the citation catalogue
const CATALOGUE_EXCERPT_CHARS: usize = 280;

pub const RESEARCH_SYSTEM: &str = "You are a ResearchAgent specialized in analyzing academic literature. \
Extract the key arguments, quotes, themes, findings and gaps relevant to the essay topic. \
Only report what the excerpts actually say and attribute every quote to the chunk it came from.";

pub const OUTLINE_SYSTEM: &str = "You are an OutlineAgent specialized in structuring academic essays. \
Design a logically ordered outline whose sections together cover every evaluation criterion \
and add up to the requested length.";

pub const WRITER_SYSTEM: &str = "You are a WriterAgent specialized in writing academic essays at the PhD level. \
Use formal academic language in the third person, present arguments with supporting evidence, \
and keep each paragraph purposeful. Write only the body text of the requested section: \
no heading, no citation markers, no bibliography.";

pub const CITATION_SYSTEM: &str = "You are a CitationAgent. You match claims in an essay section to the \
literature chunks that support them. Only use chunk ids from the catalogue you are given; \
if no chunk supports a claim, leave it out.";

pub const REVIEW_SYSTEM: &str = "You are a ReviewAgent specialized in evaluating academic essays. \
Grade the draft holistically against the evaluation criteria, from 0.0 (fails) to 1.0 (excellent), \
and list concrete, actionable deficiencies.";

pub const EDITOR_SYSTEM: &str = "You are an EditorAgent preparing an academic essay for publication. \
Write a precise title and a concise introduction that frames the essay's argument.";

fn bullet_list(items: &[String], limit: usize) -> String {
    if items.is_empty() {
        return "- (none)".to_string();
    }
    items
        .iter()
        .take(limit)
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn research_prompt(topic: &str, criteria: &str, chunks: &[LiteratureChunk]) -> String {
    let excerpts = chunks
        .iter()
        .map(|c| format!("[chunk_id: {}]\n{}", c.id, c.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    format!(
        r#"Analyze the following literature excerpts for an essay on: "{topic}"

Evaluation criteria:
{criteria}

Literature excerpts:
{excerpts}

Provide a JSON response with the following structure:
{{
    "themes": ["theme 1", "theme 2"],
    "arguments": ["argument 1", "argument 2"],
    "quotes": [
        {{"text": "exact quote text", "chunk_id": "the chunk_id the quote came from"}}
    ],
    "findings": ["finding 1"],
    "gaps": ["gap or limitation 1"]
}}

If the excerpts contain nothing relevant, return empty lists."#
    )
}

pub fn initial_outline_prompt(topic: &str, criteria: &str, target_length: u32) -> String {
    format!(
        r#"Create an essay outline for the topic: "{topic}"

Evaluation criteria:
{criteria}

The complete essay should be about {target_length} words.

Provide a JSON response with the following structure:
{{
    "title": "Essay Title",
    "sections": [
        {{
            "title": "Section Title",
            "description": "What this section covers and argues",
            "target_words": 800
        }}
    ]
}}"#
    )
}

pub fn outline_refinement_prompt(
    topic: &str,
    criteria: &str,
    initial: &Outline,
    notes: &ResearchNotes,
    target_length: u32,
) -> String {
    let sections = initial
        .sections
        .iter()
        .map(|s| format!("- {} ({} words): {}", s.title, s.target_words, s.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Refine the outline below for an essay on: "{topic}" so it makes full use of the research findings.

Evaluation criteria:
{criteria}

Current outline "{title}":
{sections}

Research themes:
{themes}

Key arguments:
{arguments}

Findings:
{findings}

Keep the essay at about {target_length} words in total.

Provide a JSON response with the same structure:
{{
    "title": "Essay Title",
    "sections": [
        {{"title": "Section Title", "description": "Scope of the section", "target_words": 800}}
    ]
}}"#,
        title = initial.title,
        themes = bullet_list(&notes.themes, 8),
        arguments = bullet_list(&notes.key_arguments, 8),
        findings = bullet_list(&notes.findings, 8),
    )
}

pub fn writer_prompt(
    topic: &str,
    criteria: &str,
    outline: &Outline,
    section: &OutlineSection,
    notes: &ResearchNotes,
    feedback: Option<&[String]>,
) -> String {
    let structure = outline
        .sections
        .iter()
        .map(|s| {
            if s.id == section.id {
                format!("- {} (this section)", s.title)
            } else {
                format!("- {}", s.title)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let quotes: Vec<String> = notes
        .quotes
        .iter()
        .take(6)
        .map(|q| format!("\"{}\"", q.text))
        .collect();

    let mut prompt = format!(
        r#"Write the "{section_title}" section of an academic essay titled "{essay_title}" on: "{topic}"

Section scope:
{description}

Essay structure:
{structure}

Evaluation criteria:
{criteria}

Key arguments from the literature:
{arguments}

Relevant quotes:
{quotes}

Write about {target_words} words of continuous prose in several substantial paragraphs."#,
        section_title = section.title,
        essay_title = outline.title,
        description = section.description,
        arguments = bullet_list(&notes.key_arguments, 8),
        quotes = bullet_list(&quotes, 6),
        target_words = section.target_words,
    );

    if let Some(comments) = feedback {
        prompt.push_str(&format!(
            "\n\nThis is a revision. The previous draft was reviewed and these deficiencies must be fixed:\n{}\n\nRewrite the section from scratch so that every point above is addressed.",
            bullet_list(comments, comments.len())
        ));
    }

    prompt
}

/// One catalogue entry: chunk id, source description and a short excerpt
pub fn catalogue_entry(chunk: &LiteratureChunk, source: &str) -> String {
    let excerpt: String = chunk.text.chars().take(CATALOGUE_EXCERPT_CHARS).collect();
    format!("[{}] {}\n{}", chunk.id, source, excerpt)
}

pub fn citation_prompt(section_title: &str, section_text: &str, catalogue: &str) -> String {
    format!(
        r#"Identify the claims in the essay section below that are supported by the literature catalogue.

Section "{section_title}":
{section_text}

Literature catalogue (chunk id, source, excerpt):
{catalogue}

For each supported claim, copy the claim text EXACTLY as it appears in the section (a sentence or clause),
name the chunk id that supports it, and give the source's first author surname and publication year
as they appear in the chunk (use "n.d." when no year is visible).

Provide a JSON response with the following structure:
{{
    "citations": [
        {{"claim": "exact text from the section", "chunk_id": "paper.pdf#3", "author": "Surname", "year": "2020"}}
    ]
}}"#
    )
}

pub fn review_prompt(topic: &str, criteria: &str, outline: &Outline, draft: &str) -> String {
    let planned = outline
        .sections
        .iter()
        .map(|s| format!("- {}: {}", s.title, s.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Evaluate the following essay draft against the criteria.

Topic: {topic}

Evaluation criteria:
{criteria}

Planned structure:
{planned}

Essay draft:
{draft}

Provide a JSON response with the following structure:
{{
    "score": 0.75,
    "weaknesses": ["specific deficiency 1", "specific deficiency 2"],
    "strengths": ["strength 1"],
    "feedback": ["actionable suggestion 1"]
}}"#
    )
}

pub fn editor_prompt(topic: &str, outline: &Outline, draft: &str) -> String {
    let headings = outline
        .sections
        .iter()
        .map(|s| format!("- {}", s.title))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"The essay below on "{topic}" is complete. Write its final title and an introduction of one or two
paragraphs that frames the argument and previews the sections:
{headings}

Essay:
{draft}

Provide a JSON response with the following structure:
{{
    "title": "Final Essay Title",
    "introduction": "Introduction text"
}}"#
    )
}
