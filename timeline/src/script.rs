//! Narration script parsing.
//!
//! Scripts arrive as one block of text with sentences separated by the
//! full-width bar `｜`, possibly wrapped in a fenced markdown block and
//! carrying footnote citations like `[^3]`.

use once_cell::sync::Lazy;
use regex::Regex;

pub const SENTENCE_SEPARATOR: char = '｜';

static CITATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\^\d+\]").expect("citation pattern is valid"));

static MARKDOWN_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```markdown(.*?)```").expect("fence pattern is valid"));

/// Removes footnote markers such as `[^12]`.
pub fn strip_citations(text: &str) -> String {
    CITATION.replace_all(text, "").into_owned()
}

/// Body of the first ```` ```markdown ```` block, or the whole text, trimmed
/// and without citations.
pub fn extract_markdown(text: &str) -> String {
    let body = MARKDOWN_FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or(text, |m| m.as_str());
    strip_citations(body.trim())
}

/// Splits on `｜`, trims, drops empty pieces and strips citations.
pub fn split_sentences(text: &str) -> Vec<String> {
    text.split(SENTENCE_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(strip_citations)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NarrationScript {
    pub title: Option<String>,
    pub sentences: Vec<String>,
}

impl NarrationScript {
    /// Parses `text`, reading only the fenced markdown body when there is one.
    /// With `title_from_first` the first sentence is taken out of the
    /// narration and becomes the title card caption.
    pub fn parse(text: &str, title_from_first: bool) -> Self {
        let mut sentences = split_sentences(&extract_markdown(text));
        let title = (title_from_first && !sentences.is_empty()).then(|| sentences.remove(0));
        Self { title, sentences }
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }
}
