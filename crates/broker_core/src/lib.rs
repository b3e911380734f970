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

//! The transport-agnostic core of the store-and-forward message broker:
//! rate limiting, session tracking, the envelope pool, delivery, node
//! registration, replication fan-out, and the periodic reaper.
//!
//! None of these types know about HTTP, WebSockets, or the wire format;
//! `broker_server` is the thin layer that binds them to a transport.

pub mod clock;
pub mod delivery;
pub mod envelope;
pub mod error;
pub mod node;
pub mod pool;
pub mod rate_limit;
pub mod reaper;
pub mod replication;
pub mod session;
pub mod settings;

pub use clock::{Clock, FakeClock, SystemClock};
pub use delivery::{DeliveryEngine, DeliveryOutcome};
pub use envelope::{Envelope, Hop, MAX_PUSH_ATTEMPTS};
pub use error::{BrokerError, ReplicationError, SessionError};
pub use node::{NodeEntry, NodeRegistry};
pub use pool::{InsertOutcome, MessagePool, RemoveOutcome};
pub use rate_limit::{Admission, RateLimiter};
pub use reaper::Reaper;
pub use replication::{ReplicationTarget, Replicator};
pub use session::{Channel, PresenceStatus, ServerFrame, SessionRegistry};
pub use settings::{Settings, SETTINGS};
