//! Fan-out of subtitle events to live subscribers.
//!
//! Delivery is best-effort, at-most-once per subscriber per event. A failing
//! subscriber is removed after the sweep without affecting the others.

use crate::broadcast::reorder::ReorderBuffer;
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::events::SubtitleEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// A live caption consumer (overlay connection, log, test collector).
///
/// `send` is called with one serialized event per invocation and must not
/// block for long; a returned error marks the subscriber for removal.
pub trait Subscriber: Send + Sync {
    /// Deliver one serialized event frame.
    fn send(&self, frame: &str) -> Result<()>;

    /// Name for logging.
    fn name(&self) -> &str {
        "subscriber"
    }
}

/// Fan-out hub with per-subscriber failure isolation and sequenced delivery
/// of finalized captions.
pub struct BroadcastHub {
    subscribers: RwLock<Vec<(u64, Arc<dyn Subscriber>)>>,
    next_id: AtomicU64,
    reorder: Mutex<ReorderBuffer>,
    clock: Arc<dyn Clock>,
}

impl BroadcastHub {
    /// Creates a hub with the given bounded wait for out-of-order captions.
    pub fn new(reorder_timeout: Duration) -> Self {
        Self::with_clock(reorder_timeout, Arc::new(SystemClock))
    }

    /// Creates a hub with an injectable clock.
    pub fn with_clock(reorder_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            reorder: Mutex::new(ReorderBuffer::new(reorder_timeout)),
            clock,
        }
    }

    /// Adds a subscriber and returns its id for later removal.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, subscriber));
        id
    }

    /// Removes a subscriber. Returns false when the id is unknown (e.g.
    /// already removed after a delivery failure).
    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Removes all subscribers (shutdown).
    pub fn clear_subscribers(&self) {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Publishes an event immediately, bypassing sequencing. Used for clear
    /// and partial events.
    pub fn publish(&self, event: &SubtitleEvent) {
        let frame = match event.to_json() {
            Ok(frame) => frame,
            Err(e) => {
                eprintln!("subcast: failed to serialize event: {}", e);
                return;
            }
        };
        self.deliver(&frame);
    }

    /// Publishes a sequenced caption. Held until all predecessors have been
    /// resolved or the bounded wait elapses.
    pub fn publish_sequenced(&self, seq: u64, event: SubtitleEvent) {
        let now = self.clock.now();
        let ready = self
            .reorder
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .complete(seq, Some(event), now);
        for event in ready {
            self.publish(&event);
        }
    }

    /// Resolves a sequence number whose segment produced no caption (engine
    /// failure, empty transcription, stale epoch), releasing successors.
    pub fn skip(&self, seq: u64) {
        let now = self.clock.now();
        let ready = self
            .reorder
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .complete(seq, None, now);
        for event in ready {
            self.publish(&event);
        }
    }

    /// Releases captions whose bounded wait has expired. Invoked
    /// periodically by the coordinator tick.
    pub fn flush_expired(&self) {
        let now = self.clock.now();
        let ready = self
            .reorder
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .flush_expired(now);
        for event in ready {
            self.publish(&event);
        }
    }

    /// Delivers one frame to a snapshot of the current subscribers, removing
    /// any that fail after the sweep.
    fn deliver(&self, frame: &str) {
        let snapshot: Vec<(u64, Arc<dyn Subscriber>)> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let mut failed = Vec::new();
        for (id, subscriber) in &snapshot {
            if let Err(e) = subscriber.send(frame) {
                eprintln!(
                    "subcast: dropping subscriber '{}' after delivery failure: {}",
                    subscriber.name(),
                    e
                );
                failed.push(*id);
            }
        }

        if !failed.is_empty() {
            self.subscribers
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .retain(|(id, _)| !failed.contains(id));
        }
    }
}

/// Subscriber printing each event as a JSON line on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSubscriber;

impl Subscriber for StdoutSubscriber {
    fn send(&self, frame: &str) -> Result<()> {
        println!("{}", frame);
        Ok(())
    }

    fn name(&self) -> &str {
        "stdout"
    }
}

/// Subscriber forwarding frames over a channel, e.g. to a push transport.
pub struct ChannelSubscriber {
    tx: crossbeam_channel::Sender<String>,
    name: String,
}

impl ChannelSubscriber {
    pub fn new(name: &str, tx: crossbeam_channel::Sender<String>) -> Self {
        Self {
            tx,
            name: name.to_string(),
        }
    }
}

impl Subscriber for ChannelSubscriber {
    fn send(&self, frame: &str) -> Result<()> {
        self.tx
            .try_send(frame.to_string())
            .map_err(|e| crate::error::SubcastError::Delivery {
                message: format!("channel send failed: {}", e),
            })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Subscriber collecting frames in memory, for tests.
#[derive(Default)]
pub struct CollectorSubscriber {
    frames: Mutex<Vec<String>>,
}

impl CollectorSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all frames received so far.
    pub fn frames(&self) -> Vec<String> {
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Deserialized snapshot of received events.
    pub fn events(&self) -> Vec<SubtitleEvent> {
        self.frames()
            .iter()
            .filter_map(|f| SubtitleEvent::from_json(f).ok())
            .collect()
    }
}

impl Subscriber for CollectorSubscriber {
    fn send(&self, frame: &str) -> Result<()> {
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(frame.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "collector"
    }
}
