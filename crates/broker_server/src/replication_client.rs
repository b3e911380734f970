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

//! HTTP-backed [`ReplicationTarget`]: POSTs an envelope to a peer's
//! `/v1/replicate` endpoint.

use async_trait::async_trait;

use broker_core::{Envelope, NodeEntry, ReplicationError, ReplicationTarget};

use crate::dto::PublishRequest;

/// Replicates envelopes to peers over plain HTTP.
pub struct HttpReplicationTarget {
    client: reqwest::Client,
}

impl HttpReplicationTarget {
    /// Creates a target backed by a fresh [`reqwest::Client`].
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpReplicationTarget {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplicationTarget for HttpReplicationTarget {
    async fn replicate(&self, peer: &NodeEntry, envelope: &Envelope) -> Result<(), ReplicationError> {
        let url = format!("{}/v1/replicate", peer.node_url.trim_end_matches('/'));

        let body = PublishRequest {
            recipient_contact_code: envelope.recipient_code.clone(),
            encrypted_message: envelope.payload.clone(),
            message_id: envelope.id.clone(),
            ttl: Some(envelope.ttl.as_millis() as u64),
            auth_tag: Some(envelope.auth_tag.clone()),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| ReplicationError::Unreachable {
                peer: peer.node_url.clone(),
                message: err.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ReplicationError::Unreachable {
                peer: peer.node_url.clone(),
                message: format!("peer responded with status {}", response.status()),
            });
        }

        Ok(())
    }
}
