// src/ingest/dedup.rs
//! Identity assignment and duplicate detection.
//!
//! Identity precedence: explicit upstream hint verbatim, else a composite of
//! company + summary prefix, else a synthesized time+random id (unique per
//! process, NOT stable across reloads).
//!
//! Duplicate checks, either sufficient: exact id already seen, or same
//! company with an identical 50-character summary prefix (guards against
//! upstream resending one logical event under a fresh generated id).

use std::collections::{HashSet, VecDeque};

use sha2::{Digest, Sha256};

use crate::dates::now_epoch_ms;
use crate::ingest::types::{Announcement, UNKNOWN_COMPANY};

/// Characters of summary that participate in the content signature. A
/// deliberate heuristic carried over as-is: long shared prefixes can
/// false-positive, reworded duplicates can false-negative.
pub const CONTENT_PREFIX_CHARS: usize = 50;

/// Characters of summary used in composite identities.
const COMPOSITE_PREFIX_CHARS: usize = 40;

/// Soft cap on remembered identities before oldest-half eviction.
pub const DEFAULT_CACHE_CAP: usize = 1000;

/// Short hex signature over company + summary prefix.
pub fn content_signature(ann: &Announcement) -> String {
    let prefix: String = ann.summary.chars().take(CONTENT_PREFIX_CHARS).collect();
    let mut hasher = Sha256::new();
    hasher.update(ann.company.as_bytes());
    hasher.update(b"|");
    hasher.update(prefix.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn slug_prefix(s: &str, max_chars: usize) -> String {
    let mut out = String::new();
    let mut last_dash = false;
    for ch in s.chars().take(max_chars) {
        if ch.is_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash && !out.is_empty() {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Bounded memory of seen identities and content signatures.
///
/// Owned by the orchestrator, never ambient: `reset()` runs on every push
/// reconnect so events lost in a disconnect window are not suppressed when
/// the upstream redelivers them. Re-delivery beats permanent dedup here.
#[derive(Debug)]
pub struct DedupCache {
    ids: HashSet<String>,
    signatures: HashSet<String>,
    order: VecDeque<(String, String)>,
    cap: usize,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAP)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            ids: HashSet::new(),
            signatures: HashSet::new(),
            order: VecDeque::new(),
            cap: cap.max(2),
        }
    }

    /// Resolve the identity for a normalized record. Does not record it;
    /// acceptance is the merge engine's call.
    pub fn assign_identity(&self, hint: Option<String>, ann: &Announcement) -> String {
        if let Some(h) = hint.map(|h| h.trim().to_string()).filter(|h| !h.is_empty()) {
            return h;
        }
        let company_known = ann.company != UNKNOWN_COMPANY && !ann.company.is_empty();
        if company_known || !ann.summary.is_empty() {
            let company = slug_prefix(&ann.company, 32);
            let summary = slug_prefix(&ann.summary, COMPOSITE_PREFIX_CHARS);
            if !company.is_empty() || !summary.is_empty() {
                return format!("{company}-{summary}");
            }
        }
        // Last resort: collision-resistant but not reload-stable.
        format!("gen-{}-{:08x}", now_epoch_ms(), rand::random::<u32>())
    }

    /// Either check passing classifies the candidate as a duplicate.
    pub fn is_duplicate(&self, ann: &Announcement) -> bool {
        self.ids.contains(&ann.id) || self.signatures.contains(&content_signature(ann))
    }

    /// Remember an accepted record. Prunes the oldest half once the soft
    /// cap is exceeded.
    pub fn record(&mut self, ann: &Announcement) {
        if self.ids.contains(&ann.id) {
            return;
        }
        let sig = content_signature(ann);
        self.ids.insert(ann.id.clone());
        self.signatures.insert(sig.clone());
        self.order.push_back((ann.id.clone(), sig));

        if self.order.len() > self.cap {
            let drop_n = self.order.len() / 2;
            for _ in 0..drop_n {
                if let Some((id, sig)) = self.order.pop_front() {
                    self.ids.remove(&id);
                    self.signatures.remove(&sig);
                }
            }
        }
    }

    /// Forget everything. Called on push-channel reconnect.
    pub fn reset(&mut self) {
        self.ids.clear();
        self.signatures.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new()
    }
}
