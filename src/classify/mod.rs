// src/classify/mod.rs
//! Announcement text classifier: category, headline, sentiment.
//!
//! Pure functions over free text. Announcements arrive either already
//! structured (`**Category:** …` / `**Headline:** …` markers) or as plain
//! prose; both shapes classify to the same triple. Missing or garbled input
//! degrades to defaults, never to an error.

pub mod categories;
pub mod headline;
pub mod sentiment;

pub use categories::resolve_category;
pub use headline::extract_headline;
pub use sentiment::{score_sentiment, Sentiment};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: String,
    pub headline: String,
    pub sentiment: Sentiment,
}

/// Classify announcement text in one pass.
pub fn classify(text: &str, existing_category: Option<&str>) -> Classification {
    Classification {
        category: resolve_category(text, existing_category),
        headline: extract_headline(text),
        sentiment: score_sentiment(text),
    }
}
