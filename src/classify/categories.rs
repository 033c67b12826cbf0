// src/classify/categories.rs
//! Category resolution against the closed vocabulary in `categories.json`,
//! with keyword fallbacks applied in fixed priority order.

use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;

/// Closed vocabulary of known announcement categories.
pub static KNOWN_CATEGORIES: Lazy<Vec<String>> = Lazy::new(|| {
    let raw = include_str!("../../categories.json");
    serde_json::from_str::<Vec<String>>(raw).expect("valid categories vocabulary")
});

pub const DEFAULT_CATEGORY: &str = "Other";

/// Keyword fallback rules, first hit wins. Order matters: dividend words are
/// checked before results words before M&A words, and so on.
const KEYWORD_RULES: &[(&str, &[&str])] = &[
    ("Dividend", &["dividend", "payout", "interim dividend", "final dividend"]),
    (
        "Financial Results",
        &[
            "results",
            "earnings",
            "quarterly",
            "financial result",
            "profit and loss",
            "unaudited",
            "audited",
        ],
    ),
    (
        "Mergers & Acquisitions",
        &["merger", "acquisition", "amalgamation", "takeover", "demerger"],
    ),
    (
        "Board Meeting",
        &["board meeting", "board of directors", "appointment", "director"],
    ),
    ("AGM", &["agm", "annual general meeting"]),
    (
        "Voting Results",
        &["voting", "postal ballot", "scrutinizer", "poll"],
    ),
    (
        "Investor/Analyst Meet",
        &["investor", "analyst", "earnings call", "conference call"],
    ),
    (
        "Procedural/Administrative",
        &[
            "compliance",
            "certificate",
            "regulation",
            "intimation",
            "disclosure",
            "newspaper publication",
        ],
    ),
];

fn category_marker_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\*\*Category:\*\*\s*([^\n*]+)").expect("category marker regex"))
}

/// Extract the `**Category:** <value>` marker value, if present.
pub fn extract_marker(text: &str) -> Option<String> {
    category_marker_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Match a candidate label against the vocabulary: exact (case-insensitive)
/// first, then substring containment in either direction. Returns the
/// canonical spelling on a hit.
pub fn match_known(candidate: &str) -> Option<String> {
    let cand = candidate.trim();
    if cand.is_empty() {
        return None;
    }
    let cand_lc = cand.to_lowercase();
    if let Some(hit) = KNOWN_CATEGORIES
        .iter()
        .find(|k| k.to_lowercase() == cand_lc)
    {
        return Some(hit.clone());
    }
    KNOWN_CATEGORIES
        .iter()
        .find(|k| {
            let k_lc = k.to_lowercase();
            k_lc.contains(&cand_lc) || cand_lc.contains(&k_lc)
        })
        .cloned()
}

/// Run the keyword fallback rules over free text, first rule that fires wins.
pub fn keyword_category(text: &str) -> Option<&'static str> {
    let lc = text.to_lowercase();
    for (label, words) in KEYWORD_RULES {
        if words.iter().any(|w| lc.contains(w)) {
            return Some(label);
        }
    }
    None
}

/// Full resolution chain: marker value against the vocabulary, then keyword
/// rules, then the caller-supplied category, then "Other".
pub fn resolve_category(text: &str, existing: Option<&str>) -> String {
    if let Some(marker) = extract_marker(text) {
        if let Some(known) = match_known(&marker) {
            return known;
        }
    }
    if let Some(label) = keyword_category(text) {
        return label.to_string();
    }
    match existing.map(str::trim).filter(|s| !s.is_empty()) {
        Some(existing) => match_known(existing).unwrap_or_else(|| existing.to_string()),
        None => DEFAULT_CATEGORY.to_string(),
    }
}
