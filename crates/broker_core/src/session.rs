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

//! The mapping from session identifier to an open duplex channel plus the
//! recipient identifier that session has claimed.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::SessionError;

/// Informational presence, carried in `status_update` broadcasts. Never
/// used for routing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresenceStatus {
    #[default]
    Online,
    Away,
    Busy,
}

/// A frame the broker writes to a session's duplex channel. Transport-
/// agnostic: the server crate maps these onto the wire frame shapes in the
/// external interface.
#[derive(Debug, Clone)]
pub enum ServerFrame {
    /// Acknowledges a successful `bind`.
    RegistrationSuccess { session_id: Uuid },
    /// A pushed envelope.
    NewMessage {
        message_id: String,
        payload: String,
        auth_tag: String,
        timestamp_ms: i64,
    },
    /// A presence broadcast, forwarded verbatim to every open session. The
    /// payload is an opaque, already-serialized blob: the broker does not
    /// interpret status broadcasts beyond relaying them.
    StatusUpdate { raw: String },
    /// An ephemeral point-to-point frame, forwarded verbatim to every
    /// session bound to one recipient. Never touches the pool.
    RealtimeMessage { raw: String },
    /// Sent in reply to a malformed inbound frame. Never closes the session.
    Error { message: String },
}

/// The send side of a session's duplex channel, as seen by the registry.
pub type Channel = UnboundedSender<ServerFrame>;

struct SessionEntry {
    channel: Channel,
    recipient_code: Option<String>,
    status: PresenceStatus,
    last_seen: Instant,
}

/// The live set of open duplex sessions.
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionEntry>,
    clock: Arc<dyn Clock>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: DashMap::new(),
            clock,
        }
    }

    /// Records a new unbound session and returns its freshly minted id.
    pub fn open(&self, channel: Channel) -> Uuid {
        let session_id = Uuid::new_v4();

        self.sessions.insert(
            session_id,
            SessionEntry {
                channel,
                recipient_code: None,
                status: PresenceStatus::default(),
                last_seen: self.clock.now(),
            },
        );

        debug!(%session_id, "session opened");
        session_id
    }

    /// Associates `session_id` with `recipient_code` and acknowledges the
    /// client. Rebinding an already-bound session replaces its recipient
    /// outright; a session is never bound to more than one mailbox.
    pub fn bind(&self, session_id: Uuid, recipient_code: &str) -> Result<(), SessionError> {
        let mut entry = self
            .sessions
            .get_mut(&session_id)
            .ok_or(SessionError::UnknownSession)?;

        entry.recipient_code = Some(recipient_code.to_string());
        entry.last_seen = self.clock.now();

        let _ = entry.channel.send(ServerFrame::RegistrationSuccess { session_id });

        Ok(())
    }

    /// Refreshes `last_seen` for `session_id`, if it is still open.
    pub fn touch(&self, session_id: Uuid) {
        if let Some(mut entry) = self.sessions.get_mut(&session_id) {
            entry.last_seen = self.clock.now();
        }
    }

    /// Updates the informational presence status for `session_id`.
    pub fn set_status(&self, session_id: Uuid, status: PresenceStatus) {
        if let Some(mut entry) = self.sessions.get_mut(&session_id) {
            entry.status = status;
        }
    }

    /// Every currently bound session whose recipient matches `recipient_code`.
    /// Iteration order is unspecified.
    pub fn lookup(&self, recipient_code: &str) -> Vec<(Uuid, Channel)> {
        self.sessions
            .iter()
            .filter(|entry| entry.recipient_code.as_deref() == Some(recipient_code))
            .map(|entry| (*entry.key(), entry.channel.clone()))
            .collect()
    }

    /// Every currently open session, bound or not. Used for `status_update`
    /// and `real_time_message` broadcasts, which are not gated on binding.
    pub fn all(&self) -> Vec<(Uuid, Channel)> {
        self.sessions
            .iter()
            .map(|entry| (*entry.key(), entry.channel.clone()))
            .collect()
    }

    /// Writes `frame` to `session_id`'s channel. A transport error (the
    /// channel's receiver having gone away) closes and removes the session,
    /// mirroring a real write failure on the underlying transport.
    pub fn send(&self, session_id: Uuid, frame: ServerFrame) -> Result<(), SendError<ServerFrame>> {
        let Some(entry) = self.sessions.get(&session_id) else {
            return Ok(());
        };

        let result = entry.channel.send(frame);
        drop(entry);

        if result.is_err() {
            self.close(session_id, "write failed");
        }

        result
    }

    /// Removes `session_id`. `reason` is informational only here; the
    /// caller's transport layer is responsible for actually closing the
    /// underlying connection with it.
    pub fn close(&self, session_id: Uuid, reason: &str) {
        if self.sessions.remove(&session_id).is_some() {
            debug!(%session_id, reason, "session closed");
        }
    }

    /// Whether `session_id` is still open.
    pub fn contains(&self, session_id: Uuid) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// The number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Closes and removes every session whose `last_seen` is older than
    /// `idle_timeout`. Returns the number reaped.
    pub fn sweep_idle(&self, idle_timeout: std::time::Duration) -> usize {
        let now = self.clock.now();

        let idle: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|entry| now.duration_since(entry.last_seen) >= idle_timeout)
            .map(|entry| *entry.key())
            .collect();

        let mut reaped = 0;
        for session_id in idle {
            if self.sessions.remove(&session_id).is_some() {
                reaped += 1;
            }
        }
        reaped
    }
}
