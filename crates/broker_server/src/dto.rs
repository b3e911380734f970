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

//! Wire-level request and response bodies for the Front Door's
//! request/response surface. Field names follow the external interface's
//! camelCase convention, independent of the snake_case used internally.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `GET /v1/health` response.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    #[serde(rename = "messagePoolSize")]
    pub message_pool_size: usize,
    #[serde(rename = "activeSessions")]
    pub active_sessions: usize,
    #[serde(rename = "connectedNodes")]
    pub connected_nodes: usize,
}

/// `POST /v1/publish` and `POST /v1/replicate` request body.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct PublishRequest {
    #[serde(rename = "recipientContactCode")]
    pub recipient_contact_code: String,
    #[serde(rename = "encryptedMessage")]
    pub encrypted_message: String,
    #[serde(rename = "messageId")]
    pub message_id: String,
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(rename = "authTag", default)]
    pub auth_tag: Option<String>,
}

/// `POST /v1/publish` and `POST /v1/replicate` response body.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct PublishResponse {
    pub success: bool,
    #[serde(rename = "messageId")]
    pub message_id: String,
    pub delivered: bool,
    pub pooled: bool,
}

/// One envelope as returned by `pull`.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct PulledMessage {
    pub id: String,
    #[serde(rename = "encryptedMessage")]
    pub encrypted_message: String,
    #[serde(rename = "authTag")]
    pub auth_tag: String,
    pub timestamp: i64,
}

/// `GET /v1/pull` response body.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct PullResponse {
    pub messages: Vec<PulledMessage>,
}

/// `GET /v1/pull` query parameters.
#[derive(Deserialize, Debug)]
pub struct PullQuery {
    #[serde(rename = "recipientContactCode")]
    pub recipient_contact_code: String,
}

/// `DELETE /v1/messages` query parameters.
#[derive(Deserialize, Debug)]
pub struct DeleteQuery {
    pub id: String,
}

/// `DELETE /v1/messages` response body.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct DeleteResponse {
    pub removed: bool,
}

/// `POST /v1/nodes` request body.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct RegisterNodeRequest {
    pub node_url: String,
    pub public_key: String,
}

/// `POST /v1/nodes` response body.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct RegisterNodeResponse {
    pub registered: bool,
}

/// One peer as returned by `list_nodes`. `last_seen_secs_ago` is derived
/// from the Clock abstraction's monotonic instant, not a wall-clock value.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct NodeView {
    pub node_url: String,
    pub last_seen_secs_ago: u64,
}

/// `GET /v1/nodes` response body.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ListNodesResponse {
    pub nodes: Vec<NodeView>,
}
