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

//! The atomic unit the broker handles: an opaque encrypted envelope with
//! routing metadata and a TTL.

use std::time::{Duration, Instant};

/// The maximum number of push attempts the delivery engine reserves room
/// for. The engine itself never retries on a timer; this only bounds the
/// counter against accidental overflow.
pub const MAX_PUSH_ATTEMPTS: u32 = 3;

/// How an envelope entered this broker.
///
/// An envelope that arrived over the replication-in endpoint must never be
/// re-offered to the [`crate::replication::Replicator`], or every broker in
/// the cluster would keep re-forwarding it to every other broker forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hop {
    /// Accepted from a publishing client; eligible for fan-out to peers.
    Published,
    /// Accepted from a peer's replication endpoint; pooled only.
    RepliedIn,
}

/// A single buffered message, opaque to the broker beyond its routing
/// metadata.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Client-chosen identifier, unique across the pool.
    pub id: String,
    /// Opaque destination mailbox identifier; matched by equality only.
    pub recipient_code: String,
    /// Opaque ciphertext payload.
    pub payload: String,
    /// Authentication tag for the payload's cipher mode. Always present on
    /// the wire; callers that don't use one send an empty string.
    pub auth_tag: String,
    /// When this envelope entered the pool, per the broker's [`Clock`](crate::clock::Clock).
    pub created_at: Instant,
    /// Time-to-live from `created_at`.
    pub ttl: Duration,
    /// Wall-clock ingress time, in milliseconds since the Unix epoch. Carried
    /// through to `new_message` frames and pull responses as a presentation
    /// value; plays no part in expiry, which is governed by `created_at`.
    pub timestamp_ms: i64,
    /// How many times a push to a session has been attempted for this
    /// envelope. Reserved for push retries; the engine never retries on its
    /// own, so this only ever reaches 1 in the current delivery model.
    pub attempts: u32,
    /// The attempt ceiling.
    pub max_attempts: u32,
    /// Whether this envelope was published by a client or replicated in
    /// from a peer.
    pub hop: Hop,
}

impl Envelope {
    /// The instant at which this envelope expires.
    pub fn expires_at(&self) -> Instant {
        self.created_at + self.ttl
    }

    /// Whether this envelope has expired as of `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at() <= now
    }
}
