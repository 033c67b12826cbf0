// src/stream.rs
//! Push-channel seam.
//!
//! The engine only needs connect/join/leave/disconnect plus a stream of raw
//! records; the dashboard's real socket client implements `StreamTransport`,
//! and `ChannelTransport` backs tests and local runs with an in-process
//! broadcast channel.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::ingest::types::RawRecord;

/// Catch-all topic every client subscribes to.
pub const TOPIC_ALL: &str = "announcements:all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Connecting,
    Disconnected,
    Error,
}

#[derive(Debug, Clone)]
pub enum StreamEvent {
    Connected,
    Record(RawRecord),
    Disconnected,
}

#[async_trait::async_trait]
pub trait StreamTransport: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn join_room(&self, topic: &str);
    async fn leave_room(&self, topic: &str);
    async fn disconnect(&self);
    fn is_connected(&self) -> bool;
    fn subscribe(&self) -> broadcast::Receiver<StreamEvent>;
}

/// Reconnect delay: ~1s doubling per attempt, capped at ~5s, retried until
/// the caller tears the connection down.
pub fn backoff_delay(attempt: u32) -> Duration {
    const BASE_MS: u64 = 1_000;
    const CAP_MS: u64 = 5_000;
    let ms = BASE_MS.saturating_mul(1u64 << attempt.min(3));
    Duration::from_millis(ms.min(CAP_MS))
}

/// In-process transport over a tokio broadcast channel. Tests push raw
/// records and connection events through it; room bookkeeping mirrors what a
/// socket client would track.
pub struct ChannelTransport {
    tx: broadcast::Sender<StreamEvent>,
    rooms: Mutex<BTreeSet<String>>,
    connected: AtomicBool,
    /// When set, the next `connect()` fails once (reconnect-path testing).
    fail_next_connect: AtomicBool,
}

impl ChannelTransport {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            tx,
            rooms: Mutex::new(BTreeSet::new()),
            connected: AtomicBool::new(false),
            fail_next_connect: AtomicBool::new(false),
        }
    }

    /// Inject a raw record as if the upstream pushed it.
    pub fn push_raw(&self, raw: RawRecord) {
        let _ = self.tx.send(StreamEvent::Record(raw));
    }

    /// Simulate a transport-level drop.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.tx.send(StreamEvent::Disconnected);
    }

    pub fn fail_next_connect(&self) {
        self.fail_next_connect.store(true, Ordering::SeqCst);
    }

    pub fn rooms(&self) -> BTreeSet<String> {
        self.rooms.lock().expect("rooms mutex poisoned").clone()
    }
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StreamTransport for ChannelTransport {
    async fn connect(&self) -> Result<()> {
        if self.fail_next_connect.swap(false, Ordering::SeqCst) {
            anyhow::bail!("simulated connect failure");
        }
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.tx.send(StreamEvent::Connected);
        Ok(())
    }

    async fn join_room(&self, topic: &str) {
        self.rooms.lock().expect("rooms mutex poisoned").insert(topic.to_string());
    }

    async fn leave_room(&self, topic: &str) {
        self.rooms.lock().expect("rooms mutex poisoned").remove(topic);
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.tx.send(StreamEvent::Disconnected);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_delay(0), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(1), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(2), Duration::from_millis(4_000));
        assert_eq!(backoff_delay(3), Duration::from_millis(5_000));
        assert_eq!(backoff_delay(30), Duration::from_millis(5_000));
    }

    #[tokio::test]
    async fn channel_transport_tracks_rooms_and_connection() {
        let t = ChannelTransport::new();
        assert!(!t.is_connected());
        t.connect().await.unwrap();
        assert!(t.is_connected());

        t.join_room("company:acme").await;
        t.join_room(TOPIC_ALL).await;
        t.leave_room("company:acme").await;
        assert_eq!(t.rooms().len(), 1);

        t.disconnect().await;
        assert!(!t.is_connected());
    }
}
