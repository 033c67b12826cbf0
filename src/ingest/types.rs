// src/ingest/types.rs
//! Raw source envelope, the canonical announcement record, and the bulk
//! source contract.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::classify::Sentiment;
use crate::dates::DateWindow;

/// Sentinel used when no company name survives alias resolution.
pub const UNKNOWN_COMPANY: &str = "Unknown Company";

/// Untyped record as delivered by either upstream (bulk REST or push
/// channel). Field names drift between 2–4 spellings per logical field, so
/// the envelope keeps the raw JSON map and resolves each field through one
/// prioritized accessor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RawRecord(pub Map<String, Value>);

impl RawRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert, mostly for tests and fixtures.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// First non-empty value among the aliases, in priority order.
    /// Numbers are stringified; anything else is ignored.
    fn first_non_empty(&self, aliases: &[&str]) -> Option<String> {
        for key in aliases {
            match self.0.get(*key) {
                Some(Value::String(s)) if !s.trim().is_empty() => {
                    return Some(s.trim().to_string())
                }
                Some(Value::Number(n)) => return Some(n.to_string()),
                _ => {}
            }
        }
        None
    }

    pub fn company(&self) -> Option<String> {
        self.first_non_empty(&["companyname", "NewName", "newname", "sm_name", "name", "Symbol"])
    }

    pub fn ticker(&self) -> Option<String> {
        self.first_non_empty(&["symbol", "Symbol", "sm_symbol", "scrip_cd"])
    }

    pub fn isin(&self) -> Option<String> {
        self.first_non_empty(&["isin", "ISIN", "sm_isin"])
    }

    pub fn category(&self) -> Option<String> {
        self.first_non_empty(&["category", "CATEGORYNAME", "cat"])
    }

    pub fn summary(&self) -> Option<String> {
        self.first_non_empty(&["summary", "HEADLINE", "headline", "NEWSSUB", "caption"])
    }

    pub fn detailed_content(&self) -> Option<String> {
        self.first_non_empty(&["detailedContent", "details", "MORE", "body"])
    }

    pub fn date(&self) -> Option<String> {
        self.first_non_empty(&["date", "News_submission_dt", "news_dt", "DissemDT", "time"])
    }

    pub fn url(&self) -> Option<String> {
        self.first_non_empty(&["url", "NSURL", "pdf_link", "ATTACHMENTNAME"])
    }

    /// Explicit upstream identity, when one exists (bulk `id`, push
    /// `corp_id`/`dedup_id`/`newsid`).
    pub fn id_hint(&self) -> Option<String> {
        self.first_non_empty(&["id", "corp_id", "dedup_id", "newsid", "NEWSID"])
    }
}

/// The single internal representation of an announcement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    /// Stable identity, unique within the canonical collection. Immutable
    /// once assigned.
    pub id: String,
    pub company: String,
    pub ticker: String,
    pub isin: String,
    pub category: String,
    pub sentiment: Sentiment,
    /// ISO-8601 timestamp, the authoritative sort key. Never mutated after
    /// normalization.
    pub date: String,
    /// Derived from `date`; recomputed, never authoritative.
    pub display_date: String,
    pub summary: String,
    pub detailed_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Epoch-ms when this client first observed the record via the live
    /// path. Ordering tie-break only, not persisted authoritatively.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<u64>,
    /// Owned by the freshness tracker; flips true→false once, never back.
    #[serde(default)]
    pub is_new: bool,
}

/// Narrow contract for the bulk REST collaborator.
#[async_trait::async_trait]
pub trait BulkSource: Send + Sync {
    async fn fetch(&self, window: &DateWindow, category: Option<&str>) -> Result<Vec<RawRecord>>;
    fn name(&self) -> &'static str;
}
