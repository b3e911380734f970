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

//! Minor services: version reporting.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

/// Reads the version defined in Cargo.toml at compile time in the format
/// `MAJOR.MINOR.PATCH_BUILD`
#[macro_export]
macro_rules! cargo_crate_version {
    () => {
        env!("CARGO_PKG_VERSION")
    };
}

/// Current broker version.
#[derive(ToSchema, Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
    build: String,
}

/// GET `/v1/version`: returns the current version of the broker.
///
/// The version is returned as json value with major, minor and patch as integer
/// and build as string (which may be empty).
/// For any error, the version endpoint returns "internal server error".
#[utoipa::path(
        get,
        path = "/version",
        responses(
            (status = 200, description = "OK", body = Version),
            (status = 500, description = "unexpected internal server error")
        ),
)]
pub async fn broker_version() -> Response {
    match string_to_version(cargo_crate_version!()) {
        Ok(j) => Json(j).into_response(),
        Err(e) => internal_server_error(&e),
    }
}

fn internal_server_error(msg: &str) -> Response {
    error!("[ERROR] {}", msg);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// Takes a string of the form "1.0.2-build" and turns it into a Version.
/// Fails if the input is not a valid version string.
pub fn string_to_version(vs: &str) -> Result<Version, String> {
    let v1 = vs.split(".").collect::<Vec<&str>>();

    let l = v1.len();
    if l < 3 {
        return Err("incomplete version number".to_string());
    } else if l > 3 {
        return Err("too many components in version number".to_string());
    }

    let major_str = v1[0];
    let minor_str = v1[1];

    // get build if any
    let tmp = v1.last().unwrap(); // we know it's not empty
    let v2 = tmp.split("-").collect::<Vec<&str>>();
    let build = if v2.len() > 1 {
        v2[1..].join("-")
    } else {
        "".to_string()
    };

    let patch_str = v2[0];

    // parse major, minor and patch from string
    let major = match major_str.parse::<u32>() {
        Ok(n) => n,
        _ => return Err("major is not a number".to_string()),
    };

    let minor = match minor_str.parse::<u32>() {
        Ok(n) => n,
        _ => return Err("minor is not a number".to_string()),
    };

    let patch = match patch_str.parse::<u32>() {
        Ok(n) => n,
        _ => return Err("patch is not a number".to_string()),
    };

    Ok(Version {
        major: major,
        minor: minor,
        patch: patch,
        build: build,
    })
}
