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

//! The Front Door's request/response endpoints: health, publish, pull,
//! delete, node registration, and peer-to-peer replication ingress.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{ConnectInfo, Query, State};
use axum::Json;
use time::OffsetDateTime;

use broker_core::{Admission, DeliveryOutcome, Envelope, Hop, InsertOutcome, RemoveOutcome};

use crate::dto::{
    DeleteQuery, DeleteResponse, HealthResponse, ListNodesResponse, NodeView, PublishRequest,
    PublishResponse, PulledMessage, PullQuery, PullResponse, RegisterNodeRequest,
    RegisterNodeResponse,
};
use crate::error::ServerError;
use crate::state::AppState;

fn wall_clock_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

fn admit(state: &AppState, source: &SocketAddr) -> Result<(), ServerError> {
    match state.rate_limiter.admit(&source.ip().to_string()) {
        Admission::Admitted => Ok(()),
        Admission::Rejected => Err(ServerError::RateLimited),
    }
}

fn require_field(value: &str, name: &str) -> Result<(), ServerError> {
    if value.trim().is_empty() {
        Err(ServerError::BadRequest(format!("missing field `{name}`")))
    } else {
        Ok(())
    }
}

/// `GET /v1/health`.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "OK", body = HealthResponse)),
)]
pub async fn health(
    State(state): State<AppState>,
    ConnectInfo(source): ConnectInfo<SocketAddr>,
) -> Result<Json<HealthResponse>, ServerError> {
    admit(&state, &source)?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        message_pool_size: state.pool.size(),
        active_sessions: state.sessions.len(),
        connected_nodes: state.nodes.len(),
    }))
}

fn build_envelope(state: &AppState, body: &PublishRequest, hop: Hop) -> Result<Envelope, ServerError> {
    require_field(&body.recipient_contact_code, "recipientContactCode")?;
    require_field(&body.encrypted_message, "encryptedMessage")?;
    require_field(&body.message_id, "messageId")?;

    let requested_ttl = body.ttl.map(Duration::from_millis).unwrap_or(state.settings.default_ttl);
    let ttl = requested_ttl.min(state.settings.max_ttl);

    Ok(Envelope {
        id: body.message_id.clone(),
        recipient_code: body.recipient_contact_code.clone(),
        payload: body.encrypted_message.clone(),
        auth_tag: body.auth_tag.clone().unwrap_or_default(),
        created_at: state.clock.now(),
        ttl,
        timestamp_ms: wall_clock_millis(),
        attempts: 0,
        max_attempts: broker_core::MAX_PUSH_ATTEMPTS,
        hop,
    })
}

/// `POST /v1/publish`: inserts, delivers, and replicates to every peer.
#[utoipa::path(
    post,
    path = "/publish",
    request_body = PublishRequest,
    responses((status = 200, description = "OK", body = PublishResponse)),
)]
pub async fn publish(
    State(state): State<AppState>,
    ConnectInfo(source): ConnectInfo<SocketAddr>,
    Json(body): Json<PublishRequest>,
) -> Result<Json<PublishResponse>, ServerError> {
    admit(&state, &source)?;
    let envelope = build_envelope(&state, &body, Hop::Published)?;
    let message_id = envelope.id.clone();

    let outcome = insert_and_deliver(&state, envelope.clone());

    state.replicator.replicate(&envelope).await;

    Ok(Json(PublishResponse {
        success: true,
        message_id,
        delivered: outcome == DeliveryOutcome::Delivered,
        pooled: outcome == DeliveryOutcome::Pooled,
    }))
}

/// `POST /v1/replicate`: peer-to-peer ingress. Inserts and delivers only;
/// never re-offered to the [`broker_core::Replicator`].
#[utoipa::path(
    post,
    path = "/replicate",
    request_body = PublishRequest,
    responses((status = 200, description = "OK", body = PublishResponse)),
)]
pub async fn replicate_in(
    State(state): State<AppState>,
    Json(body): Json<PublishRequest>,
) -> Result<Json<PublishResponse>, ServerError> {
    let envelope = build_envelope(&state, &body, Hop::RepliedIn)?;
    let message_id = envelope.id.clone();

    let outcome = insert_and_deliver(&state, envelope);

    Ok(Json(PublishResponse {
        success: true,
        message_id,
        delivered: outcome == DeliveryOutcome::Delivered,
        pooled: outcome == DeliveryOutcome::Pooled,
    }))
}

fn insert_and_deliver(state: &AppState, envelope: Envelope) -> DeliveryOutcome {
    match state.pool.insert(envelope.clone()) {
        InsertOutcome::Inserted => state.delivery.deliver(&envelope),
        InsertOutcome::Duplicate => DeliveryOutcome::Pooled,
    }
}

/// `GET /v1/pull`: drains every envelope buffered for one recipient.
#[utoipa::path(
    get,
    path = "/pull",
    params(("recipientContactCode" = String, Query, description = "recipient to drain")),
    responses((status = 200, description = "OK", body = PullResponse)),
)]
pub async fn pull(
    State(state): State<AppState>,
    ConnectInfo(source): ConnectInfo<SocketAddr>,
    Query(query): Query<PullQuery>,
) -> Result<Json<PullResponse>, ServerError> {
    admit(&state, &source)?;

    let messages = state
        .delivery
        .drain(&query.recipient_contact_code)
        .into_iter()
        .map(|e| PulledMessage {
            id: e.id,
            encrypted_message: e.payload,
            auth_tag: e.auth_tag,
            timestamp: e.timestamp_ms,
        })
        .collect();

    Ok(Json(PullResponse { messages }))
}

/// `DELETE /v1/messages`: removes one envelope from the pool by id.
#[utoipa::path(
    delete,
    path = "/messages",
    params(("id" = String, Query, description = "envelope id")),
    responses((status = 200, description = "OK", body = DeleteResponse)),
)]
pub async fn delete(
    State(state): State<AppState>,
    ConnectInfo(source): ConnectInfo<SocketAddr>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<DeleteResponse>, ServerError> {
    admit(&state, &source)?;

    let removed = state.pool.remove(&query.id) == RemoveOutcome::Removed;
    Ok(Json(DeleteResponse { removed }))
}

/// `POST /v1/nodes`: registers (or refreshes) a peer broker.
#[utoipa::path(
    post,
    path = "/nodes",
    request_body = RegisterNodeRequest,
    responses((status = 200, description = "OK", body = RegisterNodeResponse)),
)]
pub async fn register_node(
    State(state): State<AppState>,
    ConnectInfo(source): ConnectInfo<SocketAddr>,
    Json(body): Json<RegisterNodeRequest>,
) -> Result<Json<RegisterNodeResponse>, ServerError> {
    admit(&state, &source)?;
    require_field(&body.node_url, "node_url")?;
    require_field(&body.public_key, "public_key")?;

    state.nodes.register(&body.node_url, &body.public_key);

    Ok(Json(RegisterNodeResponse { registered: true }))
}

/// `GET /v1/nodes`: the current peer set.
#[utoipa::path(
    get,
    path = "/nodes",
    responses((status = 200, description = "OK", body = ListNodesResponse)),
)]
pub async fn list_nodes(
    State(state): State<AppState>,
    ConnectInfo(source): ConnectInfo<SocketAddr>,
) -> Result<Json<ListNodesResponse>, ServerError> {
    admit(&state, &source)?;

    let now = state.clock.now();

    let nodes = state
        .nodes
        .list()
        .into_iter()
        .map(|entry| NodeView {
            node_url: entry.node_url,
            last_seen_secs_ago: now.duration_since(entry.last_seen).as_secs(),
        })
        .collect();

    Ok(Json(ListNodesResponse { nodes }))
}
