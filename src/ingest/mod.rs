// src/ingest/mod.rs
pub mod dedup;
pub mod fallback;
pub mod merge;
pub mod normalize;
pub mod providers;
pub mod types;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_bulk_fetch_total", "Bulk refresh attempts.");
        describe_counter!("feed_bulk_errors_total", "Bulk fetches that failed or timed out.");
        describe_counter!(
            "feed_fallback_batches_total",
            "Refreshes served from the placeholder fallback provider."
        );
        describe_counter!("feed_bulk_records_total", "Raw records parsed from bulk responses.");
        describe_counter!("feed_push_events_total", "Raw records received on the push channel.");
        describe_counter!(
            "feed_dedup_dropped_total",
            "Push records dropped as duplicates (by id or content)."
        );
        describe_counter!("feed_refresh_runs_total", "Scheduled refresh ticks.");
        describe_counter!("feed_stream_drops_total", "Push-channel disconnects observed.");
        describe_counter!("feed_stream_reconnects_total", "Successful push-channel reconnects.");
        describe_gauge!("feed_collection_size", "Records in the canonical collection.");
        describe_gauge!("feed_unseen_count", "Records currently unseen/unread.");
        describe_histogram!("feed_bulk_parse_ms", "Bulk batch parse time in milliseconds.");
    });
}
