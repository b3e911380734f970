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

//! Broker Error Handling

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use broker_core::BrokerError;

/// Abstraction over every error the Front Door can produce. Allows using
/// `?` in handlers for both admission failures and core errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A required field was missing or malformed in the request body.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The caller has exhausted its rate-limit budget.
    #[error("too many requests")]
    RateLimited,
    /// An error surfaced from `broker_core`.
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::RateLimited => {
                (StatusCode::TOO_MANY_REQUESTS, self.to_string())
            }
            ServerError::Broker(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
