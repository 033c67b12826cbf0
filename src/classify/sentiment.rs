// src/classify/sentiment.rs
//! Keyword sentiment for announcement text.
//!
//! Positive words are checked first: text containing both positive and
//! negative words scores Positive. No hits either way scores Neutral.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Default for Sentiment {
    fn default() -> Self {
        Sentiment::Neutral
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "Positive"),
            Sentiment::Negative => write!(f, "Negative"),
            Sentiment::Neutral => write!(f, "Neutral"),
        }
    }
}

const POSITIVE_WORDS: &[&str] = &[
    "growth",
    "increase",
    "profit",
    "benefit",
    "success",
    "rise",
    "up",
    "improvement",
    "higher",
];

const NEGATIVE_WORDS: &[&str] = &[
    "decline",
    "decrease",
    "loss",
    "drop",
    "down",
    "fall",
    "concern",
    "risk",
    "adverse",
    "lower",
];

/// Alphanumeric tokens, lower-cased. Word-level matching keeps "update" from
/// hitting "up".
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

pub fn score_sentiment(text: &str) -> Sentiment {
    let mut negative = false;
    for tok in tokenize(text) {
        if POSITIVE_WORDS.contains(&tok.as_str()) {
            return Sentiment::Positive;
        }
        if NEGATIVE_WORDS.contains(&tok.as_str()) {
            negative = true;
        }
    }
    if negative {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}
