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

//! The shared handle every Front Door route and the WebSocket endpoint
//! closes over.

use std::sync::Arc;

use broker_core::{
    Clock, DeliveryEngine, MessagePool, NodeRegistry, RateLimiter, Replicator, Settings,
    SessionRegistry,
};

/// All broker component handles, cheaply clonable and shared across every
/// request and session task.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<MessagePool>,
    pub sessions: Arc<SessionRegistry>,
    pub nodes: Arc<NodeRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    pub delivery: Arc<DeliveryEngine>,
    pub replicator: Arc<Replicator>,
    pub clock: Arc<dyn Clock>,
    pub settings: Arc<Settings>,
}
