/* Copyright 2023- The Binedge, Lda team. All rights reserved.
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *     http://www.apache.org/licenses/LICENSE-2.0
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! The authoritative in-memory queue of buffered, undelivered envelopes.
//!
//! Keyed by envelope id in a [`DashMap`]; `take_for` is a full scan, which
//! is fine at the pool sizes this broker targets and avoids a secondary
//! per-recipient index to keep in sync. Because removal of a single key is
//! atomic, two racing `take_for` calls for the same recipient can never
//! both win the same envelope: whichever remove wins first keeps it, and
//! the loser's subsequent remove is a no-op.

use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::envelope::Envelope;

/// The outcome of [`MessagePool::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The envelope was added.
    Inserted,
    /// An envelope with this id was already present; the existing entry is
    /// retained unchanged.
    Duplicate,
}

/// The outcome of [`MessagePool::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    Missing,
}

/// The in-memory envelope buffer.
#[derive(Default)]
pub struct MessagePool {
    envelopes: DashMap<String, Envelope>,
}

impl MessagePool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `envelope`, or reports `Duplicate` if its id is already present.
    pub fn insert(&self, envelope: Envelope) -> InsertOutcome {
        match self.envelopes.entry(envelope.id.clone()) {
            Entry::Occupied(_) => InsertOutcome::Duplicate,
            Entry::Vacant(slot) => {
                slot.insert(envelope);
                InsertOutcome::Inserted
            }
        }
    }

    /// Atomically removes and returns every envelope addressed to
    /// `recipient_code`, in insertion order.
    pub fn take_for(&self, recipient_code: &str) -> Vec<Envelope> {
        let candidates: Vec<String> = self
            .envelopes
            .iter()
            .filter(|entry| entry.recipient_code == recipient_code)
            .map(|entry| entry.id.clone())
            .collect();

        let mut taken: Vec<Envelope> = candidates
            .into_iter()
            .filter_map(|id| self.envelopes.remove(&id).map(|(_, envelope)| envelope))
            .collect();

        taken.sort_by_key(|e| e.timestamp_ms);
        taken
    }

    /// Removes the envelope with id `id`, if present.
    pub fn remove(&self, id: &str) -> RemoveOutcome {
        if self.envelopes.remove(id).is_some() {
            RemoveOutcome::Removed
        } else {
            RemoveOutcome::Missing
        }
    }

    /// Removes every envelope whose `created_at + ttl <= now`. Returns the
    /// number removed.
    pub fn expire_before(&self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .envelopes
            .iter()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.id.clone())
            .collect();

        expired
            .into_iter()
            .filter(|id| self.envelopes.remove(id).is_some())
            .count()
    }

    /// The current number of buffered envelopes.
    pub fn size(&self) -> usize {
        self.envelopes.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::envelope::Hop;
    use std::time::Duration;

    fn envelope(id: &str, recipient: &str, created_at: Instant, ttl_secs: u64) -> Envelope {
        Envelope {
            id: id.to_string(),
            recipient_code: recipient.to_string(),
            payload: "ciphertext".to_string(),
            auth_tag: String::new(),
            created_at,
            ttl: Duration::from_secs(ttl_secs),
            timestamp_ms: 0,
            attempts: 0,
            max_attempts: 3,
            hop: Hop::Published,
        }
    }

    #[test]
    fn insert_reports_duplicate_and_retains_original() {
        let pool = MessagePool::new();
        let now = Instant::now();

        assert_eq!(
            pool.insert(envelope("m1", "R", now, 60)),
            InsertOutcome::Inserted
        );
        assert_eq!(
            pool.insert(envelope("m1", "other", now, 60)),
            InsertOutcome::Duplicate
        );

        let taken = pool.take_for("R");
        assert_eq!(taken.len(), 1);
        assert!(pool.take_for("other").is_empty());
    }

    #[test]
    fn take_for_drains_exactly_once() {
        let pool = MessagePool::new();
        let now = Instant::now();
        pool.insert(envelope("m1", "R", now, 60));

        assert_eq!(pool.take_for("R").len(), 1);
        assert!(pool.take_for("R").is_empty());
    }

    #[test]
    fn size_tracks_inserts_and_removals() {
        let pool = MessagePool::new();
        let now = Instant::now();

        pool.insert(envelope("m1", "R", now, 60));
        pool.insert(envelope("m2", "R", now, 60));
        assert_eq!(pool.size(), 2);

        assert_eq!(pool.remove("m1"), RemoveOutcome::Removed);
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.remove("m1"), RemoveOutcome::Missing);
    }

    #[test]
    fn expire_before_removes_only_past_deadlines() {
        let pool = MessagePool::new();
        let now = Instant::now();

        pool.insert(envelope("expired", "R", now, 1));
        pool.insert(envelope("fresh", "R", now, 600));

        let later = now + Duration::from_secs(2);
        assert_eq!(pool.expire_before(later), 1);
        assert_eq!(pool.size(), 1);
        assert!(pool.take_for("R").iter().any(|e| e.id == "fresh"));
    }

    #[test]
    fn delete_is_idempotent() {
        let pool = MessagePool::new();
        pool.insert(envelope("m1", "R", Instant::now(), 60));

        assert_eq!(pool.remove("m1"), RemoveOutcome::Removed);
        assert_eq!(pool.remove("m1"), RemoveOutcome::Missing);
    }
}
