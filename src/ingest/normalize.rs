// src/ingest/normalize.rs
//! Canonical record normalizer: heterogeneous raw envelopes in, one
//! consistent `Announcement` shape out. Total: malformed input degrades to
//! safe defaults, it never errors.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::classify;
use crate::dates;
use crate::ingest::types::{Announcement, RawRecord, UNKNOWN_COMPANY};

fn tags_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag strip regex"))
}

fn spaces_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    // Horizontal whitespace only. Newlines carry the marker structure
    // (`**Headline:** …` terminates at line breaks) and must survive.
    RE.get_or_init(|| Regex::new(r"[ \t\r]+").expect("space collapse regex"))
}

/// Clean upstream text: decode HTML entities, strip tags, normalize curly
/// quotes, collapse runs of horizontal whitespace.
pub fn clean_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();
    out = tags_re().replace_all(&out, "").to_string();
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00A0}', " ");
    out = spaces_re().replace_all(&out, " ").to_string();
    out.trim().to_string()
}

fn has_markers(s: &str) -> bool {
    s.contains("**Category:**") || s.contains("**Headline:**")
}

/// Convert one raw envelope into the canonical shape. Identity assignment is
/// the dedup engine's job; the raw id hint travels separately.
pub fn normalize(raw: &RawRecord) -> Announcement {
    let company = raw.company().unwrap_or_else(|| UNKNOWN_COMPANY.to_string());
    let ticker = raw.ticker().unwrap_or_default();
    let isin = raw.isin().unwrap_or_default();

    let summary_raw = raw.summary().map(|s| clean_text(&s)).unwrap_or_default();
    let detailed_raw = raw
        .detailed_content()
        .map(|s| clean_text(&s))
        .unwrap_or_else(|| summary_raw.clone());

    let classification = classify::classify(&summary_raw, raw.category().as_deref());

    // Synthesize the structured prefix when the source text is plain prose.
    // The detailed body only gets the prefix when it mirrored the summary,
    // so a distinct long-form body is left untouched.
    let (summary, detailed_content) = if has_markers(&summary_raw) {
        (summary_raw.clone(), detailed_raw)
    } else {
        let prefixed = format!(
            "**Category:** {}\n**Headline:** {}\n\n{}",
            classification.category, classification.headline, summary_raw
        );
        let detailed = if detailed_raw == summary_raw {
            prefixed.clone()
        } else {
            detailed_raw
        };
        (prefixed, detailed)
    };

    let date = raw.date().unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
    let display_date = dates::format_date(&date);

    Announcement {
        id: String::new(),
        company,
        ticker,
        isin,
        category: classification.category,
        sentiment: classification.sentiment,
        date,
        display_date,
        summary,
        detailed_content,
        url: raw.url(),
        received_at: None,
        is_new: false,
    }
}

/// Batch form; order preserved.
pub fn normalize_batch(raws: &[RawRecord]) -> Vec<Announcement> {
    raws.iter().map(normalize).collect()
}
