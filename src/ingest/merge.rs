// src/ingest/merge.rs
//! Merge incoming batches into the canonical collection and keep it in one
//! total order.
//!
//! Ordering: per-record effective key (`received_at` when present, else the
//! parsed `date`), descending, records with unparseable dates last, stable
//! for ties. Callers own state storage; these functions only compute.

use std::collections::HashSet;

use crate::dates::{now_epoch_ms, parse_flexible_ms};
use crate::ingest::dedup::{content_signature, DedupCache};
use crate::ingest::types::Announcement;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub accepted: usize,
    pub duplicates: usize,
}

/// Effective sort key in epoch-ms. `None` means "sort last".
pub fn effective_sort_key(ann: &Announcement) -> Option<i64> {
    ann.received_at
        .map(|ms| ms as i64)
        .or_else(|| parse_flexible_ms(&ann.date))
}

/// Stable descending order by effective key, unparseable dates last.
pub fn order_feed(feed: &mut [Announcement]) {
    feed.sort_by_key(|a| {
        let key = effective_sort_key(a);
        (key.is_none(), std::cmp::Reverse(key.unwrap_or(0)))
    });
}

/// Merge a batch into the existing collection. Duplicates (by id against the
/// collection and the cache, by content signature against the cache) are
/// silently skipped, an expected outcome rather than an error. Records arriving on
/// the live path are tagged `is_new` and stamped `received_at`.
pub fn merge_into(
    existing: &mut Vec<Announcement>,
    incoming: Vec<Announcement>,
    cache: &mut DedupCache,
    live: bool,
) -> MergeStats {
    let mut stats = MergeStats::default();
    let mut present: HashSet<String> = existing.iter().map(|a| a.id.clone()).collect();

    for mut ann in incoming {
        if present.contains(&ann.id) || cache.is_duplicate(&ann) {
            stats.duplicates += 1;
            continue;
        }
        if live {
            ann.is_new = true;
            ann.received_at = Some(now_epoch_ms());
        }
        cache.record(&ann);
        present.insert(ann.id.clone());
        existing.push(ann);
        stats.accepted += 1;
    }

    order_feed(existing);
    stats
}

/// Replace the base collection with a freshly fetched batch.
///
/// The fresh batch is deduplicated against itself only: it IS the new base,
/// so prior cache history must not empty it. Records from the previous
/// collection still flagged unseen and absent from the fresh batch are
/// re-injected: a push-delivered item is never dropped just because the next
/// bulk window excluded it. Returns the new collection and the re-injection
/// count.
pub fn bulk_replace(
    previous: Vec<Announcement>,
    fresh: Vec<Announcement>,
    cache: &mut DedupCache,
) -> (Vec<Announcement>, usize) {
    let mut base: Vec<Announcement> = Vec::with_capacity(fresh.len());
    let mut ids: HashSet<String> = HashSet::new();
    let mut sigs: HashSet<String> = HashSet::new();

    for ann in fresh {
        let sig = content_signature(&ann);
        if ids.contains(&ann.id) || sigs.contains(&sig) {
            continue;
        }
        ids.insert(ann.id.clone());
        sigs.insert(sig);
        base.push(ann);
    }

    let mut reinjected = 0usize;
    for prev in previous {
        if prev.is_new && !ids.contains(&prev.id) {
            ids.insert(prev.id.clone());
            base.push(prev);
            reinjected += 1;
        }
    }

    for ann in &base {
        cache.record(ann);
    }

    order_feed(&mut base);
    (base, reinjected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Sentiment;

    fn ann(id: &str, date: &str) -> Announcement {
        Announcement {
            id: id.to_string(),
            company: format!("Company {id}"),
            ticker: String::new(),
            isin: String::new(),
            category: "Other".to_string(),
            sentiment: Sentiment::Neutral,
            date: date.to_string(),
            display_date: String::new(),
            summary: format!("Unique summary body for record {id}"),
            detailed_content: String::new(),
            url: None,
            received_at: None,
            is_new: false,
        }
    }

    #[test]
    fn merge_is_idempotent() {
        let batch = vec![ann("A", "2025-03-17T10:00:00Z"), ann("B", "2025-03-16T10:00:00Z")];
        let mut cache = DedupCache::new();

        let mut coll = Vec::new();
        merge_into(&mut coll, batch.clone(), &mut cache, false);
        let once = coll.clone();

        let stats = merge_into(&mut coll, batch, &mut cache, false);
        assert_eq!(stats.accepted, 0);
        assert_eq!(stats.duplicates, 2);
        assert_eq!(coll, once);
    }

    #[test]
    fn first_seen_wins_on_id_collision() {
        let mut cache = DedupCache::new();
        let mut coll = Vec::new();
        let original = ann("A1", "2025-03-17T10:00:00Z");
        merge_into(&mut coll, vec![original.clone()], &mut cache, false);

        let mut imposter = ann("A1", "2025-03-18T10:00:00Z");
        imposter.company = "Different Co".to_string();
        imposter.summary = "Different content entirely".to_string();
        let stats = merge_into(&mut coll, vec![imposter], &mut cache, false);

        assert_eq!(stats.duplicates, 1);
        assert_eq!(coll.len(), 1);
        assert_eq!(coll[0], original, "original entry preserved");
    }

    #[test]
    fn live_records_get_is_new_and_received_at() {
        let mut cache = DedupCache::new();
        let mut coll = Vec::new();
        merge_into(&mut coll, vec![ann("A", "2025-03-17T10:00:00Z")], &mut cache, true);
        assert!(coll[0].is_new);
        assert!(coll[0].received_at.is_some());

        merge_into(&mut coll, vec![ann("B", "2025-03-18T10:00:00Z")], &mut cache, false);
        let b = coll.iter().find(|a| a.id == "B").unwrap();
        assert!(!b.is_new);
        assert!(b.received_at.is_none());
    }

    #[test]
    fn order_is_descending_with_invalid_dates_last() {
        let mut feed = vec![
            ann("old", "2025-01-01T00:00:00Z"),
            ann("bad", "not-a-date"),
            ann("new", "2025-03-17T10:00:00Z"),
            ann("mid", "2025-02-01T00:00:00Z"),
        ];
        order_feed(&mut feed);
        let ids: Vec<&str> = feed.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old", "bad"]);
    }

    #[test]
    fn received_at_outranks_date() {
        let mut pushed = ann("pushed", "2025-01-01T00:00:00Z");
        pushed.received_at = Some(now_epoch_ms());
        let mut feed = vec![ann("bulk", "2025-03-17T10:00:00Z"), pushed];
        order_feed(&mut feed);
        assert_eq!(feed[0].id, "pushed", "live receipt time wins over an older filing date");
    }

    #[test]
    fn equal_keys_keep_encounter_order() {
        let mut feed = vec![ann("first", "2025-03-17T10:00:00Z"), ann("second", "2025-03-17T10:00:00Z")];
        order_feed(&mut feed);
        let ids: Vec<&str> = feed.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"], "sort is stable");
    }

    #[test]
    fn bulk_replace_reinjects_unseen_push_items() {
        let mut cache = DedupCache::new();
        let mut pushed = ann("live-1", "2025-03-17T09:00:00Z");
        pushed.is_new = true;
        pushed.received_at = Some(now_epoch_ms());
        let previous = vec![pushed, ann("stale", "2025-03-01T00:00:00Z")];

        let fresh = vec![ann("A", "2025-03-17T10:00:00Z"), ann("B", "2025-03-16T10:00:00Z")];
        let (coll, reinjected) = bulk_replace(previous, fresh, &mut cache);

        assert_eq!(reinjected, 1);
        assert!(coll.iter().any(|a| a.id == "live-1"), "unseen push item survives");
        assert!(!coll.iter().any(|a| a.id == "stale"), "read items follow the bulk window");
        assert_eq!(coll.len(), 3);
    }

    #[test]
    fn bulk_replace_is_not_emptied_by_cache_history() {
        let mut cache = DedupCache::new();
        let fresh = vec![ann("A", "2025-03-17T10:00:00Z")];
        let (coll, _) = bulk_replace(Vec::new(), fresh.clone(), &mut cache);
        assert_eq!(coll.len(), 1);

        // Same window fetched again: cache already knows "A", the batch must
        // still become the base.
        let (coll2, _) = bulk_replace(coll, fresh, &mut cache);
        assert_eq!(coll2.len(), 1);
    }
}
