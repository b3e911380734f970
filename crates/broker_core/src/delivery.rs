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

//! Attempts a push over the session registry; falls back to leaving the
//! envelope pooled. The pool is ground truth; push is an optimization.

use std::sync::Arc;

use crate::envelope::Envelope;
use crate::pool::MessagePool;
use crate::session::{ServerFrame, SessionRegistry};

/// The outcome of [`DeliveryEngine::deliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// At least one bound session accepted the push; the envelope was
    /// removed from the pool.
    Delivered,
    /// No bound session accepted the push; the envelope remains pooled.
    Pooled,
}

/// Pushes newly inserted envelopes to online recipients, and serves pull
/// requests by draining the pool.
pub struct DeliveryEngine {
    pool: Arc<MessagePool>,
    sessions: Arc<SessionRegistry>,
}

impl DeliveryEngine {
    /// Creates an engine over the given pool and session registry.
    pub fn new(pool: Arc<MessagePool>, sessions: Arc<SessionRegistry>) -> Self {
        Self { pool, sessions }
    }

    /// Attempts to push `envelope` to every session bound to its recipient.
    /// Must be called immediately after `pool.insert(envelope)` succeeded;
    /// `envelope` is expected to still be present in the pool.
    pub fn deliver(&self, envelope: &Envelope) -> DeliveryOutcome {
        let candidates = self.sessions.lookup(&envelope.recipient_code);

        let mut delivered = false;
        for (session_id, _channel) in candidates {
            let frame = ServerFrame::NewMessage {
                message_id: envelope.id.clone(),
                payload: envelope.payload.clone(),
                auth_tag: envelope.auth_tag.clone(),
                timestamp_ms: envelope.timestamp_ms,
            };

            if self.sessions.send(session_id, frame).is_ok() {
                delivered = true;
            }
        }

        if delivered {
            self.pool.remove(&envelope.id);
            DeliveryOutcome::Delivered
        } else {
            DeliveryOutcome::Pooled
        }
    }

    /// Drains and returns every envelope pooled for `recipient_code`.
    pub fn drain(&self, recipient_code: &str) -> Vec<Envelope> {
        self.pool.take_for(recipient_code)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clock::SystemClock;
    use crate::envelope::Hop;
    use std::time::{Duration, Instant};
    use tokio::sync::mpsc::unbounded_channel;

    fn envelope(id: &str, recipient: &str) -> Envelope {
        Envelope {
            id: id.to_string(),
            recipient_code: recipient.to_string(),
            payload: "ciphertext".to_string(),
            auth_tag: String::new(),
            created_at: Instant::now(),
            ttl: Duration::from_secs(60),
            timestamp_ms: 0,
            attempts: 0,
            max_attempts: 3,
            hop: Hop::Published,
        }
    }

    fn engine() -> (DeliveryEngine, Arc<MessagePool>, Arc<SessionRegistry>) {
        let pool = Arc::new(MessagePool::new());
        let sessions = Arc::new(SessionRegistry::new(Arc::new(SystemClock)));
        let engine = DeliveryEngine::new(pool.clone(), sessions.clone());
        (engine, pool, sessions)
    }

    #[test]
    fn pools_when_no_session_bound() {
        let (engine, pool, _sessions) = engine();
        let e = envelope("m1", "R");
        pool.insert(e.clone());

        assert_eq!(engine.deliver(&e), DeliveryOutcome::Pooled);
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn delivers_and_removes_from_pool_when_session_bound() {
        let (engine, pool, sessions) = engine();
        let (tx, mut rx) = unbounded_channel();
        let session_id = sessions.open(tx);
        sessions.bind(session_id, "R").unwrap();
        rx.try_recv().unwrap(); // registration_success

        let e = envelope("m2", "R");
        pool.insert(e.clone());

        assert_eq!(engine.deliver(&e), DeliveryOutcome::Delivered);
        assert_eq!(pool.size(), 0);

        match rx.try_recv().unwrap() {
            ServerFrame::NewMessage { message_id, .. } => assert_eq!(message_id, "m2"),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn two_subscribers_both_receive_the_push() {
        let (engine, pool, sessions) = engine();
        let (tx1, mut rx1) = unbounded_channel();
        let (tx2, mut rx2) = unbounded_channel();
        let s1 = sessions.open(tx1);
        let s2 = sessions.open(tx2);
        sessions.bind(s1, "R").unwrap();
        sessions.bind(s2, "R").unwrap();
        rx1.try_recv().unwrap();
        rx2.try_recv().unwrap();

        let e = envelope("m4", "R");
        pool.insert(e.clone());

        assert_eq!(engine.deliver(&e), DeliveryOutcome::Delivered);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn drain_serves_pull_requests() {
        let (engine, pool, _sessions) = engine();
        pool.insert(envelope("m1", "R"));

        let drained = engine.drain("R");
        assert_eq!(drained.len(), 1);
        assert!(engine.drain("R").is_empty());
    }
}
