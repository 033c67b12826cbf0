// src/classify/headline.rs
//! Headline extraction from semi-structured announcement text.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Character cap for the truncation fallback.
const FALLBACK_MAX_CHARS: usize = 80;

fn headline_marker_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        // Headline runs until the next marker, a blank line, or end of text.
        Regex::new(r"(?s)\*\*Headline:\*\*[ \t]*(.*?)(?:\n\s*\n|\*\*|##|$)")
            .expect("headline marker regex")
    })
}

fn category_line_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\*\*Category:\*\*[^\n]*\n?").expect("category line regex"))
}

fn inner_ws_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s*\n+\s*").expect("newline collapse regex"))
}

/// Extract a headline:
/// - `**Headline:** <value>` marker, captured up to the next `**`/`##`
///   marker, blank line, or end of text, internal newlines collapsed to
///   single spaces;
/// - otherwise the first sentence (terminated by `.`, `!` or `?`) of the text
///   with any `**Category:**` line stripped;
/// - otherwise the first 80 characters with an ellipsis appended.
pub fn extract_headline(text: &str) -> String {
    if let Some(caps) = headline_marker_re().captures(text) {
        if let Some(m) = caps.get(1) {
            let collapsed = inner_ws_re().replace_all(m.as_str(), " ");
            let trimmed = collapsed.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }

    let stripped = category_line_re().replace_all(text, "");
    let stripped = stripped.trim();

    if let Some(sentence) = first_sentence(stripped) {
        return sentence;
    }

    let mut out: String = stripped.chars().take(FALLBACK_MAX_CHARS).collect();
    out.push_str("...");
    out
}

/// First run of text ending in a sentence terminator, if any.
fn first_sentence(text: &str) -> Option<String> {
    let end = text.find(['.', '!', '?'])?;
    // `end` indexes a one-byte ASCII terminator, so `..=end` stays on a
    // char boundary.
    Some(text[..=end].trim().to_string())
}
