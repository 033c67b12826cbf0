// src/ingest/fallback.rs
//! Named fallback policy for failed or empty bulk fetches.
//!
//! When the bulk collaborator times out, errors, or returns nothing, the
//! orchestrator substitutes a small synthetic batch instead of surfacing a
//! hard-empty feed. The ids carry a recognizable prefix so tests and
//! consumers can always tell placeholder data from the real thing.

use crate::ingest::types::RawRecord;

/// Prefix on every synthetic placeholder id.
pub const PLACEHOLDER_ID_PREFIX: &str = "placeholder-";

pub fn is_placeholder(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_ID_PREFIX)
}

/// Swappable source of substitute data. `NoFallback` disables the policy in
/// tests that need to observe failures directly.
pub trait FallbackDataProvider: Send + Sync {
    fn batch(&self) -> Vec<RawRecord>;
}

/// Built-in placeholder batch shown during backend outages and local
/// development.
#[derive(Debug, Default, Clone)]
pub struct PlaceholderData;

impl FallbackDataProvider for PlaceholderData {
    fn batch(&self) -> Vec<RawRecord> {
        let specs: [(&str, &str, &str, &str); 3] = [
            (
                "1",
                "Sample Industries",
                "SMPL",
                "**Category:** Financial Results\n**Headline:** Sample Industries posts quarterly results\n\nPlaceholder entry shown while the announcement service is unreachable.",
            ),
            (
                "2",
                "Demo Manufacturing",
                "DEMO",
                "**Category:** Dividend\n**Headline:** Demo Manufacturing declares interim dividend\n\nPlaceholder entry shown while the announcement service is unreachable.",
            ),
            (
                "3",
                "Example Finance",
                "EXFI",
                "**Category:** Board Meeting\n**Headline:** Example Finance schedules board meeting\n\nPlaceholder entry shown while the announcement service is unreachable.",
            ),
        ];

        let now = chrono::Utc::now().to_rfc3339();
        specs
            .iter()
            .map(|(n, company, ticker, summary)| {
                RawRecord::new()
                    .with("id", format!("{PLACEHOLDER_ID_PREFIX}{n}"))
                    .with("companyname", *company)
                    .with("symbol", *ticker)
                    .with("summary", *summary)
                    .with("date", now.clone())
            })
            .collect()
    }
}

/// Disables substitution entirely: failures yield an empty batch.
#[derive(Debug, Default, Clone)]
pub struct NoFallback;

impl FallbackDataProvider for NoFallback {
    fn batch(&self) -> Vec<RawRecord> {
        Vec::new()
    }
}
