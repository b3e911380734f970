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

//! The set of peer brokers known to this node.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

use crate::clock::Clock;

/// A peer broker known to this node.
#[derive(Debug, Clone)]
pub struct NodeEntry {
    /// Network address of the peer's replication endpoint.
    pub node_url: String,
    /// Opaque key material; the broker does not interpret this.
    pub public_key: String,
    /// When the peer last (re-)registered.
    pub last_seen: Instant,
}

/// The registry of peer brokers. No staleness eviction is specified; peers
/// persist until process exit.
pub struct NodeRegistry {
    nodes: DashMap<String, NodeEntry>,
    clock: Arc<dyn Clock>,
}

impl NodeRegistry {
    /// Creates an empty registry.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            nodes: DashMap::new(),
            clock,
        }
    }

    /// Idempotent insert with a refreshed `last_seen`.
    pub fn register(&self, node_url: &str, public_key: &str) {
        self.nodes.insert(
            node_url.to_string(),
            NodeEntry {
                node_url: node_url.to_string(),
                public_key: public_key.to_string(),
                last_seen: self.clock.now(),
            },
        );
    }

    /// The current set of known peers.
    pub fn list(&self) -> Vec<NodeEntry> {
        self.nodes.iter().map(|e| e.value().clone()).collect()
    }

    /// The number of known peers.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the registry holds no peers.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
