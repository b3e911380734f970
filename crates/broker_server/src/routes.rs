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

//! Contains every route served by the broker.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;
use crate::{http, misc, ws};

/// Builds the full router over a constructed [`AppState`].
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(http::health))
        .route("/v1/publish", post(http::publish))
        .route("/v1/replicate", post(http::replicate_in))
        .route("/v1/pull", get(http::pull))
        .route("/v1/messages", delete(http::delete))
        .route("/v1/nodes", post(http::register_node).get(http::list_nodes))
        .route("/v1/ws", get(ws::ws_upgrade))
        .route("/v1/version", get(misc::broker_version))
        .with_state(state)
}
