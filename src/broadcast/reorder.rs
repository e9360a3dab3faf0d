//! Sequence reordering for concurrently processed captions.
//!
//! Worker tasks complete in arbitrary order. Each dispatched utterance gets
//! a monotonically increasing sequence number; every number is eventually
//! resolved by exactly one `complete` (publish) or one `skip` (dropped
//! segment, stale epoch). Completions that arrive ahead of their
//! predecessors are held, but only up to a bounded wait: a worker that dies
//! without resolving its number must not stall captions forever.

use crate::events::SubtitleEvent;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

struct Slot {
    event: Option<SubtitleEvent>,
    arrived: Instant,
}

/// Holds out-of-order caption completions until predecessors arrive or the
/// bounded wait elapses.
pub struct ReorderBuffer {
    next: u64,
    pending: BTreeMap<u64, Slot>,
    timeout: Duration,
}

impl ReorderBuffer {
    /// Creates a buffer expecting sequence numbers starting at 1.
    pub fn new(timeout: Duration) -> Self {
        Self {
            next: 1,
            pending: BTreeMap::new(),
            timeout,
        }
    }

    /// Records the completion of `seq` and returns every event now ready for
    /// delivery, in sequence order. `event` is `None` for skipped numbers.
    ///
    /// Completions for already-released numbers (late arrivals after their
    /// gap was abandoned) are dropped: delivery is at-most-once.
    pub fn complete(
        &mut self,
        seq: u64,
        event: Option<SubtitleEvent>,
        now: Instant,
    ) -> Vec<SubtitleEvent> {
        if seq < self.next {
            return Vec::new();
        }
        self.pending.insert(
            seq,
            Slot {
                event,
                arrived: now,
            },
        );
        self.drain(now)
    }

    /// Releases events whose bounded wait has expired. Called periodically
    /// so a permanently missing predecessor cannot hold captions back.
    pub fn flush_expired(&mut self, now: Instant) -> Vec<SubtitleEvent> {
        self.drain(now)
    }

    /// Number of completions currently held.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn drain(&mut self, now: Instant) -> Vec<SubtitleEvent> {
        let mut ready = Vec::new();
        loop {
            if let Some(slot) = self.pending.remove(&self.next) {
                if let Some(event) = slot.event {
                    ready.push(event);
                }
                self.next += 1;
                continue;
            }

            // Gap at self.next: wait for it unless the oldest held completion
            // has already waited out the bounded delay.
            match self.pending.iter().next() {
                Some((&seq, slot)) if now.duration_since(slot.arrived) >= self.timeout => {
                    self.next = seq;
                }
                _ => break,
            }
        }
        ready
    }
}
