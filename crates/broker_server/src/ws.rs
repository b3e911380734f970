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

//! The Front Door's duplex-channel endpoint. One task per open session:
//! reads inbound frames and dispatches them to the session registry; a
//! second task relays outbound [`ServerFrame`]s written by other
//! components back over the socket.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tracing::debug;

use broker_core::ServerFrame;

use crate::state::AppState;

/// `GET /v1/ws`: upgrades to the duplex-channel protocol.
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let session_id = state.sessions.open(tx);

    let outbound = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = encode_frame(&frame);
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => handle_inbound(&state, session_id, &text),
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.sessions.close(session_id, "channel closed");
    outbound.abort();
}

fn handle_inbound(state: &AppState, session_id: uuid::Uuid, text: &str) {
    state.sessions.touch(session_id);

    let Ok(value) = serde_json::from_str::<Value>(text) else {
        send_error(state, session_id, "malformed frame");
        return;
    };

    match value.get("type").and_then(Value::as_str) {
        Some("register_user") => match value.get("contactCode").and_then(Value::as_str) {
            Some(code) => {
                if state.sessions.bind(session_id, code).is_err() {
                    debug!(%session_id, "bind against a session that no longer exists");
                }
            }
            None => send_error(state, session_id, "missing field `contactCode`"),
        },
        Some("status_update") => {
            for (other_id, _channel) in state.sessions.all() {
                let _ = state.sessions.send(
                    other_id,
                    ServerFrame::StatusUpdate {
                        raw: text.to_string(),
                    },
                );
            }
        }
        Some("real_time_message") => {
            match value.get("recipientContactCode").and_then(Value::as_str) {
                Some(recipient) => {
                    for (target_id, _channel) in state.sessions.lookup(recipient) {
                        let _ = state.sessions.send(
                            target_id,
                            ServerFrame::RealtimeMessage {
                                raw: text.to_string(),
                            },
                        );
                    }
                }
                None => send_error(state, session_id, "missing field `recipientContactCode`"),
            }
        }
        _ => send_error(state, session_id, "unknown frame type"),
    }
}

fn send_error(state: &AppState, session_id: uuid::Uuid, message: &str) {
    let _ = state.sessions.send(
        session_id,
        ServerFrame::Error {
            message: message.to_string(),
        },
    );
}

fn encode_frame(frame: &ServerFrame) -> String {
    match frame {
        ServerFrame::RegistrationSuccess { session_id } => json!({
            "type": "registration_success",
            "sessionId": session_id.to_string(),
        })
        .to_string(),
        ServerFrame::NewMessage {
            message_id,
            payload,
            auth_tag,
            timestamp_ms,
        } => json!({
            "type": "new_message",
            "messageId": message_id,
            "message": payload,
            "authTag": auth_tag,
            "timestamp": timestamp_ms,
        })
        .to_string(),
        // Both of these already carry a complete, serialized frame
        // (including its own `type` tag) produced by the sender; the broker
        // only relays it.
        ServerFrame::StatusUpdate { raw } => raw.clone(),
        ServerFrame::RealtimeMessage { raw } => raw.clone(),
        ServerFrame::Error { message } => json!({
            "type": "error",
            "error": message,
        })
        .to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use broker_core::{DeliveryEngine, MessagePool, NodeRegistry, RateLimiter, Replicator, Settings, SessionRegistry, SystemClock};
    use std::sync::Arc;
    use std::time::Duration;

    struct NoopTarget;

    #[async_trait::async_trait]
    impl broker_core::ReplicationTarget for NoopTarget {
        async fn replicate(
            &self,
            _peer: &broker_core::NodeEntry,
            _envelope: &broker_core::Envelope,
        ) -> Result<(), broker_core::ReplicationError> {
            Ok(())
        }
    }

    fn state() -> AppState {
        let clock = Arc::new(SystemClock);
        let nodes = Arc::new(NodeRegistry::new(clock.clone()));
        let sessions = Arc::new(SessionRegistry::new(clock.clone()));
        let pool = Arc::new(MessagePool::new());
        AppState {
            pool: pool.clone(),
            sessions: sessions.clone(),
            nodes: nodes.clone(),
            rate_limiter: Arc::new(RateLimiter::new(100, Duration::from_secs(60), clock.clone())),
            delivery: Arc::new(DeliveryEngine::new(pool, sessions)),
            replicator: Arc::new(Replicator::new(nodes, Arc::new(NoopTarget), Duration::from_secs(5))),
            clock,
            settings: Arc::new(Settings::default()),
        }
    }

    #[test]
    fn register_user_binds_and_acks() {
        let state = state();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let session_id = state.sessions.open(tx);

        handle_inbound(&state, session_id, r#"{"type":"register_user","contactCode":"R"}"#);

        match rx.try_recv().unwrap() {
            ServerFrame::RegistrationSuccess { session_id: acked } => assert_eq!(acked, session_id),
            other => panic!("unexpected frame: {:?}", other),
        }
        assert_eq!(state.sessions.lookup("R").len(), 1);
    }

    #[test]
    fn unknown_type_sends_error_and_keeps_session() {
        let state = state();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let session_id = state.sessions.open(tx);

        handle_inbound(&state, session_id, r#"{"type":"frobnicate"}"#);

        assert!(matches!(rx.try_recv().unwrap(), ServerFrame::Error { .. }));
        assert!(state.sessions.contains(session_id));
    }

    #[test]
    fn malformed_json_sends_error_and_keeps_session() {
        let state = state();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let session_id = state.sessions.open(tx);

        handle_inbound(&state, session_id, "not json");

        assert!(matches!(rx.try_recv().unwrap(), ServerFrame::Error { .. }));
        assert!(state.sessions.contains(session_id));
    }

    #[test]
    fn status_update_broadcasts_to_every_session() {
        let state = state();
        let (tx1, _rx1) = tokio::sync::mpsc::unbounded_channel();
        let (tx2, mut rx2) = tokio::sync::mpsc::unbounded_channel();
        let sender = state.sessions.open(tx1);
        state.sessions.open(tx2);

        handle_inbound(
            &state,
            sender,
            r#"{"type":"status_update","status":"away"}"#,
        );

        match rx2.try_recv().unwrap() {
            ServerFrame::StatusUpdate { raw } => assert!(raw.contains("away")),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn real_time_message_forwards_only_to_bound_recipient() {
        let state = state();
        let (tx1, mut rx1) = tokio::sync::mpsc::unbounded_channel();
        let (tx2, mut rx2) = tokio::sync::mpsc::unbounded_channel();
        let s1 = state.sessions.open(tx1);
        let s2 = state.sessions.open(tx2);
        state.sessions.bind(s1, "alice").unwrap();
        state.sessions.bind(s2, "bob").unwrap();
        rx1.try_recv().unwrap();
        rx2.try_recv().unwrap();

        handle_inbound(
            &state,
            s2,
            r#"{"type":"real_time_message","recipientContactCode":"alice","text":"hi"}"#,
        );

        assert!(matches!(
            rx1.try_recv().unwrap(),
            ServerFrame::RealtimeMessage { .. }
        ));
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn encode_frame_relays_raw_status_update_verbatim() {
        let raw = r#"{"type":"status_update","status":"busy"}"#.to_string();
        assert_eq!(encode_frame(&ServerFrame::StatusUpdate { raw: raw.clone() }), raw);
    }
}
