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

//! Best-effort fan-out of accepted envelopes to every known peer.
//!
//! This module is transport-agnostic: it knows how to iterate the
//! [`NodeRegistry`] and bound each attempt with a timeout, but the actual
//! network call is supplied by a [`ReplicationTarget`] implementation that
//! lives in the server crate (an HTTP client, in production; a recording
//! fake, in tests).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::envelope::Envelope;
use crate::error::ReplicationError;
use crate::node::{NodeEntry, NodeRegistry};

/// A transport capable of replicating one envelope to one peer.
#[async_trait]
pub trait ReplicationTarget: Send + Sync {
    /// Sends `envelope` to `peer`'s replication endpoint.
    async fn replicate(&self, peer: &NodeEntry, envelope: &Envelope) -> Result<(), ReplicationError>;
}

/// Fans an envelope out to every peer in the [`NodeRegistry`]. Failures are
/// logged and ignored; there is no quorum, retry, or acknowledgement.
pub struct Replicator {
    nodes: Arc<NodeRegistry>,
    target: Arc<dyn ReplicationTarget>,
    timeout: Duration,
}

impl Replicator {
    /// Creates a replicator over `nodes`, dispatching through `target` with
    /// a per-peer `timeout`.
    pub fn new(nodes: Arc<NodeRegistry>, target: Arc<dyn ReplicationTarget>, timeout: Duration) -> Self {
        Self {
            nodes,
            target,
            timeout,
        }
    }

    /// Replicates `envelope` to every known peer. Never fails; every peer
    /// failure is logged and swallowed independently of the others.
    pub async fn replicate(&self, envelope: &Envelope) {
        for peer in self.nodes.list() {
            match tokio::time::timeout(self.timeout, self.target.replicate(&peer, envelope)).await
            {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(peer = %peer.node_url, error = %err, "replication failed");
                }
                Err(_) => {
                    warn!(peer = %peer.node_url, "replication timed out");
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::envelope::Hop;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    struct RecordingTarget {
        calls: Mutex<Vec<String>>,
        attempts: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl ReplicationTarget for RecordingTarget {
        async fn replicate(&self, peer: &NodeEntry, _envelope: &Envelope) -> Result<(), ReplicationError> {
            self.calls.lock().unwrap().push(peer.node_url.clone());
            if self.fail_first && self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(ReplicationError::Unreachable {
                    peer: peer.node_url.clone(),
                    message: "refused".to_string(),
                });
            }
            Ok(())
        }
    }

    fn envelope() -> Envelope {
        Envelope {
            id: "m1".to_string(),
            recipient_code: "R".to_string(),
            payload: "x".to_string(),
            auth_tag: String::new(),
            created_at: Instant::now(),
            ttl: Duration::from_secs(60),
            timestamp_ms: 0,
            attempts: 0,
            max_attempts: 3,
            hop: Hop::Published,
        }
    }

    #[tokio::test]
    async fn fans_out_to_every_peer() {
        let nodes = Arc::new(NodeRegistry::new(Arc::new(crate::clock::SystemClock)));
        nodes.register("http://a", "ka");
        nodes.register("http://b", "kb");

        let target = Arc::new(RecordingTarget {
            calls: Mutex::new(vec![]),
            attempts: AtomicUsize::new(0),
            fail_first: false,
        });

        let replicator = Replicator::new(nodes, target.clone(), Duration::from_secs(1));
        replicator.replicate(&envelope()).await;

        let calls = target.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
    }

    #[tokio::test]
    async fn one_peer_failing_does_not_stop_fan_out() {
        let nodes = Arc::new(NodeRegistry::new(Arc::new(crate::clock::SystemClock)));
        nodes.register("http://a", "ka");
        nodes.register("http://b", "kb");

        let target = Arc::new(RecordingTarget {
            calls: Mutex::new(vec![]),
            attempts: AtomicUsize::new(0),
            fail_first: true,
        });

        let replicator = Replicator::new(nodes, target.clone(), Duration::from_secs(1));
        replicator.replicate(&envelope()).await;

        assert_eq!(target.calls.lock().unwrap().len(), 2);
    }
}
