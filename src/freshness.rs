// src/freshness.rs
//! Per-identity read state: `Unseen` until acknowledged, `Read` forever
//! after. The read-id set persists through the KV store so acknowledgements
//! survive a reload.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::store::{read_id_list, write_id_list, KvStore, READ_IDS_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Unseen,
    Read,
}

pub struct ReadStateTracker {
    store: Arc<dyn KvStore>,
    read: Mutex<HashSet<String>>,
    unseen: Mutex<HashSet<String>>,
}

impl ReadStateTracker {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        let read: HashSet<String> = read_id_list(store.as_ref(), READ_IDS_KEY).into_iter().collect();
        Self {
            store,
            read: Mutex::new(read),
            unseen: Mutex::new(HashSet::new()),
        }
    }

    /// Register a live-path record as unseen. No-op for identities already
    /// acknowledged: Read never reverts to Unseen. A logically "new again"
    /// event must arrive under a new identity to count as fresh.
    pub fn mark_unseen(&self, id: &str) {
        if self.read.lock().expect("read set mutex poisoned").contains(id) {
            return;
        }
        self.unseen
            .lock()
            .expect("unseen set mutex poisoned")
            .insert(id.to_string());
    }

    /// Acknowledge a record. Idempotent: repeating it is a no-op, not an
    /// error. Persists the read-id set.
    pub fn mark_read(&self, id: &str) {
        let newly_read = self.read.lock().expect("read set mutex poisoned").insert(id.to_string());
        self.unseen.lock().expect("unseen set mutex poisoned").remove(id);
        if newly_read {
            self.persist();
        }
    }

    pub fn state(&self, id: &str) -> ReadState {
        if self.unseen.lock().expect("unseen set mutex poisoned").contains(id) {
            ReadState::Unseen
        } else {
            ReadState::Read
        }
    }

    pub fn is_unseen(&self, id: &str) -> bool {
        self.unseen.lock().expect("unseen set mutex poisoned").contains(id)
    }

    pub fn unseen_count(&self) -> usize {
        self.unseen.lock().expect("unseen set mutex poisoned").len()
    }

    fn persist(&self) {
        let ids: Vec<String> = {
            let read = self.read.lock().expect("read set mutex poisoned");
            read.iter().cloned().collect()
        };
        if let Err(e) = write_id_list(self.store.as_ref(), READ_IDS_KEY, &ids) {
            tracing::warn!(error = ?e, "persisting read ids failed");
        }
    }
}
