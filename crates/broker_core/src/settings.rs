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

//! Environment-driven broker configuration.
//!
//! Unlike a long-running model server, the broker has nothing worth
//! hot-reloading: every value here is read once at startup and held for the
//! life of the process.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;

/// Global settings, parsed from the environment on first access.
pub static SETTINGS: Lazy<Settings> = Lazy::new(Settings::from_env);

/// All broker configuration, sourced from environment variables with the
/// defaults documented in the external interface spec.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Port the HTTP/WebSocket listener binds to.
    pub port: u16,
    /// Allowed cross-origin list. `["*"]` means permissive.
    pub cors_origins: Vec<String>,
    /// Rate-limit bucket capacity, in points.
    pub rate_limit_points: u32,
    /// Rate-limit refill window.
    pub rate_limit_window: Duration,
    /// Default envelope TTL when the publisher does not override it.
    pub default_ttl: Duration,
    /// Upper bound on a caller-supplied TTL.
    pub max_ttl: Duration,
    /// Cadence of the envelope-expiry sweep.
    pub envelope_sweep_interval: Duration,
    /// Cadence of the idle-session sweep.
    pub session_sweep_interval: Duration,
    /// Cadence of the stale rate-limit-bucket sweep.
    pub bucket_sweep_interval: Duration,
    /// How long a session may go without an inbound frame before reaping.
    pub session_idle_timeout: Duration,
    /// Per-peer timeout for a replication request.
    pub replication_timeout: Duration,
}

impl Settings {
    /// Reads settings from the environment, falling back to the documented
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self {
            port: env_or("BROKER_PORT", 3000),
            cors_origins: env_list_or("BROKER_CORS_ORIGINS", vec!["*".to_string()]),
            rate_limit_points: env_or("BROKER_RATE_LIMIT_POINTS", 100),
            rate_limit_window: Duration::from_secs(env_or("BROKER_RATE_LIMIT_WINDOW_SECS", 60)),
            default_ttl: Duration::from_secs(env_or("BROKER_DEFAULT_TTL_SECS", 24 * 60 * 60)),
            max_ttl: Duration::from_secs(env_or("BROKER_MAX_TTL_SECS", 7 * 24 * 60 * 60)),
            envelope_sweep_interval: Duration::from_secs(env_or(
                "BROKER_ENVELOPE_SWEEP_SECS",
                5 * 60,
            )),
            session_sweep_interval: Duration::from_secs(env_or("BROKER_SESSION_SWEEP_SECS", 60)),
            bucket_sweep_interval: Duration::from_secs(env_or("BROKER_BUCKET_SWEEP_SECS", 60)),
            session_idle_timeout: Duration::from_secs(env_or("BROKER_SESSION_IDLE_SECS", 5 * 60)),
            replication_timeout: Duration::from_secs(env_or(
                "BROKER_REPLICATION_TIMEOUT_SECS",
                5,
            )),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        // Does not read the environment; used by tests that want the
        // documented defaults without depending on process state.
        Self {
            port: 3000,
            cors_origins: vec!["*".to_string()],
            rate_limit_points: 100,
            rate_limit_window: Duration::from_secs(60),
            default_ttl: Duration::from_secs(24 * 60 * 60),
            max_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            envelope_sweep_interval: Duration::from_secs(5 * 60),
            session_sweep_interval: Duration::from_secs(60),
            bucket_sweep_interval: Duration::from_secs(60),
            session_idle_timeout: Duration::from_secs(5 * 60),
            replication_timeout: Duration::from_secs(5),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_list_or(key: &str, default: Vec<String>) -> Vec<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v.split(',').map(|s| s.trim().to_string()).collect(),
        _ => default,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let s = Settings::default();
        assert_eq!(s.port, 3000);
        assert_eq!(s.rate_limit_points, 100);
        assert_eq!(s.rate_limit_window, Duration::from_secs(60));
        assert_eq!(s.default_ttl, Duration::from_secs(24 * 60 * 60));
        assert_eq!(s.envelope_sweep_interval, Duration::from_secs(5 * 60));
        assert_eq!(s.session_sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn env_list_parses_comma_separated() {
        assert_eq!(
            env_list_or("BROKER_TEST_DOES_NOT_EXIST", vec!["*".to_string()]),
            vec!["*".to_string()]
        );
    }
}
