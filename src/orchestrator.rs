// src/orchestrator.rs
//! Ingestion orchestrator: the one component touching external I/O.
//!
//! Coordinates periodic bulk refreshes and the continuous push stream,
//! feeding both through normalize → identity → merge → freshness, and owns
//! every piece of shared mutable state (canonical collection, dedup cache,
//! read-state). Consumers only ever see immutable snapshots.
//!
//! Merges are serialized: collection and cache locks are taken together and
//! never held across an await, so each merge (dedup-cache update included)
//! completes before the next one starts.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::{counter, gauge};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::FeedConfig;
use crate::dates::{validated_window, DateWindow};
use crate::freshness::ReadStateTracker;
use crate::ingest::dedup::DedupCache;
use crate::ingest::fallback::FallbackDataProvider;
use crate::ingest::merge::{bulk_replace, merge_into};
use crate::ingest::normalize::normalize;
use crate::ingest::types::{Announcement, BulkSource, RawRecord};
use crate::store::KvStore;
use crate::stream::{backoff_delay, ConnectionStatus, StreamEvent, StreamTransport, TOPIC_ALL};

/// Current filter criteria, as set by the consumer. The topic subscription
/// set is a pure function of this value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilter {
    pub companies: Vec<String>,
    pub tickers: Vec<String>,
    pub isins: Vec<String>,
    pub category: Option<String>,
}

/// Topics relevant to a filter: one room per company/ticker/isin/category,
/// plus the catch-all.
pub fn topics_for_filter(filter: &FeedFilter) -> BTreeSet<String> {
    let mut topics = BTreeSet::new();
    topics.insert(TOPIC_ALL.to_string());
    for c in &filter.companies {
        if !c.trim().is_empty() {
            topics.insert(format!("company:{}", c.trim()));
        }
    }
    for t in &filter.tickers {
        if !t.trim().is_empty() {
            topics.insert(format!("ticker:{}", t.trim()));
        }
    }
    for i in &filter.isins {
        if !i.trim().is_empty() {
            topics.insert(format!("isin:{}", i.trim()));
        }
    }
    if let Some(cat) = filter.category.as_deref() {
        if !cat.trim().is_empty() {
            topics.insert(format!("category:{}", cat.trim()));
        }
    }
    topics
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshOutcome {
    pub window: DateWindow,
    pub total: usize,
    pub reinjected: usize,
    pub fallback_used: bool,
    /// True when a newer refresh superseded this one; its result was
    /// discarded (last request wins).
    pub superseded: bool,
}

pub struct Orchestrator {
    bulk: Arc<dyn BulkSource>,
    transport: Arc<dyn StreamTransport>,
    fallback: Arc<dyn FallbackDataProvider>,
    tracker: ReadStateTracker,
    collection: Mutex<Vec<Announcement>>,
    cache: Mutex<DedupCache>,
    status: Mutex<ConnectionStatus>,
    filter: Mutex<FeedFilter>,
    joined: Mutex<BTreeSet<String>>,
    refresh_gen: AtomicU64,
    closed: AtomicBool,
    enriched_tx: broadcast::Sender<Announcement>,
    cfg: FeedConfig,
}

impl Orchestrator {
    pub fn new(
        bulk: Arc<dyn BulkSource>,
        transport: Arc<dyn StreamTransport>,
        store: Arc<dyn KvStore>,
        fallback: Arc<dyn FallbackDataProvider>,
        cfg: FeedConfig,
    ) -> Self {
        let (enriched_tx, _) = broadcast::channel(256);
        Self {
            bulk,
            transport,
            fallback,
            tracker: ReadStateTracker::new(store),
            collection: Mutex::new(Vec::new()),
            cache: Mutex::new(DedupCache::with_capacity(cfg.dedup_cache_cap)),
            status: Mutex::new(ConnectionStatus::Disconnected),
            filter: Mutex::new(FeedFilter::default()),
            joined: Mutex::new(BTreeSet::new()),
            refresh_gen: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            enriched_tx,
            cfg,
        }
    }

    // ---- consumer surface ----

    /// Immutable snapshot of the canonical, ordered, deduplicated feed.
    pub fn snapshot(&self) -> Vec<Announcement> {
        self.collection.lock().expect("collection mutex poisoned").clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.lock().expect("status mutex poisoned")
    }

    pub fn unseen_count(&self) -> usize {
        self.tracker.unseen_count()
    }

    pub fn tracker(&self) -> &ReadStateTracker {
        &self.tracker
    }

    /// Acknowledge one record. Idempotent; the snapshot flag follows.
    pub fn mark_read(&self, id: &str) {
        self.tracker.mark_read(id);
        {
            let mut coll = self.collection.lock().expect("collection mutex poisoned");
            if let Some(rec) = coll.iter_mut().find(|a| a.id == id) {
                rec.is_new = false;
            }
        }
        gauge!("feed_unseen_count").set(self.tracker.unseen_count() as f64);
    }

    /// Enriched records republished from the live path.
    pub fn subscribe_enriched(&self) -> broadcast::Receiver<Announcement> {
        self.enriched_tx.subscribe()
    }

    // ---- bulk path ----

    /// Bulk refresh for a caller-specified window (strict `YYYY-MM-DD`;
    /// anything else silently becomes the trailing 30-day default). The
    /// fresh batch replaces the base collection; locally-unseen records
    /// missing from it are re-injected. Concurrent calls: last request wins,
    /// earlier in-flight results are discarded on arrival.
    pub async fn refresh(
        &self,
        start: Option<&str>,
        end: Option<&str>,
        category: Option<&str>,
    ) -> RefreshOutcome {
        let generation = self.refresh_gen.fetch_add(1, Ordering::SeqCst) + 1;
        let window = validated_window(start, end);
        counter!("feed_bulk_fetch_total").increment(1);

        let fetched = tokio::time::timeout(
            Duration::from_secs(self.cfg.bulk_timeout_secs),
            self.bulk.fetch(&window, category),
        )
        .await;

        let (raws, fallback_used) = match fetched {
            Ok(Ok(batch)) if !batch.is_empty() => (batch, false),
            Ok(Ok(_)) => {
                tracing::warn!(source = self.bulk.name(), "bulk fetch returned empty batch, substituting fallback data");
                counter!("feed_fallback_batches_total").increment(1);
                (self.fallback.batch(), true)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = ?e, source = self.bulk.name(), "bulk fetch failed, substituting fallback data");
                counter!("feed_bulk_errors_total").increment(1);
                counter!("feed_fallback_batches_total").increment(1);
                (self.fallback.batch(), true)
            }
            Err(_) => {
                tracing::warn!(source = self.bulk.name(), timeout_secs = self.cfg.bulk_timeout_secs, "bulk fetch timed out, substituting fallback data");
                counter!("feed_bulk_errors_total").increment(1);
                counter!("feed_fallback_batches_total").increment(1);
                (self.fallback.batch(), true)
            }
        };

        if self.refresh_gen.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "refresh superseded by a newer request, discarding result");
            return RefreshOutcome {
                window,
                total: self.collection.lock().expect("collection mutex poisoned").len(),
                reinjected: 0,
                fallback_used,
                superseded: true,
            };
        }

        let (total, reinjected) = {
            let mut coll = self.collection.lock().expect("collection mutex poisoned");
            let mut cache = self.cache.lock().expect("dedup cache mutex poisoned");

            let mut fresh = Vec::with_capacity(raws.len());
            for raw in &raws {
                let mut ann = normalize(raw);
                ann.id = cache.assign_identity(raw.id_hint(), &ann);
                fresh.push(ann);
            }

            let previous = std::mem::take(&mut *coll);
            let (mut base, reinjected) = bulk_replace(previous, fresh, &mut cache);
            for rec in &mut base {
                rec.is_new = self.tracker.is_unseen(&rec.id);
            }
            let total = base.len();
            *coll = base;
            (total, reinjected)
        };

        gauge!("feed_collection_size").set(total as f64);
        gauge!("feed_unseen_count").set(self.tracker.unseen_count() as f64);
        tracing::info!(
            target: "feed",
            total,
            reinjected,
            fallback = fallback_used,
            start = %window.start,
            end = %window.end,
            "bulk refresh merged"
        );

        RefreshOutcome {
            window,
            total,
            reinjected,
            fallback_used,
            superseded: false,
        }
    }

    /// Periodic refresh driver.
    pub fn spawn_refresh_scheduler(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(this.cfg.refresh_interval_secs));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if this.closed.load(Ordering::SeqCst) {
                    break;
                }
                let category = this.filter.lock().expect("filter mutex poisoned").category.clone();
                let outcome = this.refresh(None, None, category.as_deref()).await;
                counter!("feed_refresh_runs_total").increment(1);
                tracing::debug!(target: "feed", total = outcome.total, "scheduled refresh tick");
            }
        })
    }

    // ---- live path ----

    /// Run one raw push event through the pipeline. Returns the enriched
    /// record when it was accepted, `None` for duplicates.
    pub fn handle_push(&self, raw: RawRecord) -> Option<Announcement> {
        counter!("feed_push_events_total").increment(1);

        let accepted = {
            let mut coll = self.collection.lock().expect("collection mutex poisoned");
            let mut cache = self.cache.lock().expect("dedup cache mutex poisoned");

            let mut ann = normalize(&raw);
            ann.id = cache.assign_identity(raw.id_hint(), &ann);

            let stats = merge_into(&mut coll, vec![ann.clone()], &mut cache, true);
            if stats.accepted == 0 {
                counter!("feed_dedup_dropped_total").increment(1);
                None
            } else {
                // The merged copy carries is_new/received_at.
                coll.iter().find(|a| a.id == ann.id).cloned()
            }
        };

        let accepted = accepted?;
        self.tracker.mark_unseen(&accepted.id);
        gauge!("feed_unseen_count").set(self.tracker.unseen_count() as f64);
        gauge!("feed_collection_size")
            .set(self.collection.lock().expect("collection mutex poisoned").len() as f64);

        let _ = self.enriched_tx.send(accepted.clone());
        Some(accepted)
    }

    // ---- subscriptions ----

    /// Replace the filter criteria and reconcile room subscriptions: join
    /// newly-relevant topics, leave ones no longer needed.
    pub async fn set_filter(&self, filter: FeedFilter) {
        let desired = topics_for_filter(&filter);
        *self.filter.lock().expect("filter mutex poisoned") = filter;

        let current = self.joined.lock().expect("joined mutex poisoned").clone();
        for topic in current.difference(&desired) {
            self.transport.leave_room(topic).await;
        }
        for topic in desired.difference(&current) {
            self.transport.join_room(topic).await;
        }
        *self.joined.lock().expect("joined mutex poisoned") = desired;
    }

    pub fn joined_topics(&self) -> BTreeSet<String> {
        self.joined.lock().expect("joined mutex poisoned").clone()
    }

    async fn resubscribe_all(&self) {
        let desired = {
            let filter = self.filter.lock().expect("filter mutex poisoned");
            topics_for_filter(&filter)
        };
        for topic in &desired {
            self.transport.join_room(topic).await;
        }
        *self.joined.lock().expect("joined mutex poisoned") = desired;
    }

    // ---- connection lifecycle ----

    fn set_status(&self, status: ConnectionStatus) {
        *self.status.lock().expect("status mutex poisoned") = status;
    }

    /// Long-running push-event loop: connect, process records, and on any
    /// drop reconnect forever with bounded backoff, resetting the dedup
    /// cache and resubscribing every time, until `shutdown()`.
    pub fn spawn_event_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.event_loop().await })
    }

    async fn event_loop(&self) {
        let mut rx = self.transport.subscribe();

        self.set_status(ConnectionStatus::Connecting);
        match self.transport.connect().await {
            Ok(()) => {
                self.set_status(ConnectionStatus::Connected);
                self.resubscribe_all().await;
            }
            Err(e) => {
                tracing::warn!(error = ?e, "initial stream connect failed");
                self.set_status(ConnectionStatus::Error);
                self.reconnect_with_backoff().await;
            }
        }

        loop {
            if self.closed.load(Ordering::SeqCst) {
                break;
            }
            match rx.recv().await {
                Ok(StreamEvent::Record(raw)) => {
                    self.handle_push(raw);
                }
                Ok(StreamEvent::Connected) => {
                    self.set_status(ConnectionStatus::Connected);
                }
                Ok(StreamEvent::Disconnected) => {
                    if self.closed.load(Ordering::SeqCst) {
                        break;
                    }
                    self.set_status(ConnectionStatus::Disconnected);
                    counter!("feed_stream_drops_total").increment(1);
                    self.reconnect_with_backoff().await;
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "push event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        self.set_status(ConnectionStatus::Disconnected);
    }

    async fn reconnect_with_backoff(&self) {
        let mut attempt = 0u32;
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(backoff_delay(attempt)).await;
            self.set_status(ConnectionStatus::Connecting);
            match self.transport.connect().await {
                Ok(()) => {
                    // Events lost during the disconnect window may be
                    // redelivered; forgetting seen identities lets them in.
                    self.cache.lock().expect("dedup cache mutex poisoned").reset();
                    self.set_status(ConnectionStatus::Connected);
                    self.resubscribe_all().await;
                    counter!("feed_stream_reconnects_total").increment(1);
                    tracing::info!(attempt, "stream reconnected");
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = ?e, attempt, "stream reconnect failed");
                    self.set_status(ConnectionStatus::Error);
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    /// Tear the connection down for good.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.transport.disconnect().await;
        self.set_status(ConnectionStatus::Disconnected);
    }
}
