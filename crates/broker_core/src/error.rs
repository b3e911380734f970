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

//! Broker error handling.
//!
//! Outcomes handled locally (duplicate insert, rebind of a dead session)
//! are modeled as plain outcome enums on the relevant component, not as
//! errors here: a duplicate envelope or a missing session is an expected
//! result, not a fault. This module holds the errors that are genuinely
//! exceptional -- a bind against a session that no longer exists, or a
//! replication request that failed outright.

use thiserror::Error;

/// Failures from the [`crate::session::SessionRegistry`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// `bind` was called with a session id that has already been closed
    /// (or never existed).
    #[error("unknown session")]
    UnknownSession,
}

/// Failures from the [`crate::replication::Replicator`] fanning an envelope
/// out to a single peer. Always logged and swallowed by the caller; never
/// propagated to the publish path.
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// The peer could not be reached, or returned a non-success response.
    #[error("peer {peer} unreachable: {message}")]
    Unreachable {
        /// The peer's replication endpoint.
        peer: String,
        /// A human-readable description of the failure.
        message: String,
    },
    /// The peer did not respond within [`crate::settings::Settings::replication_timeout`].
    #[error("peer {peer} timed out")]
    Timeout {
        /// The peer's replication endpoint.
        peer: String,
    },
}

/// Aggregates the broker's fallible component errors so that callers at the
/// front door can use `?` uniformly.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// A session-registry operation failed.
    #[error("session error: {0}")]
    Session(#[from] SessionError),
}
