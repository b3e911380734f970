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

//! Periodic maintenance: evicts expired envelopes, idle sessions, and
//! stale rate-limit buckets.
//!
//! Each sweep runs on its own schedule and never overlaps with another run
//! of itself; the three schedules are otherwise fully independent of one
//! another.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::info;

use crate::clock::Clock;
use crate::pool::MessagePool;
use crate::rate_limit::RateLimiter;
use crate::session::SessionRegistry;

/// Owns the three periodic sweeps and the handles needed to run them.
pub struct Reaper {
    pool: Arc<MessagePool>,
    sessions: Arc<SessionRegistry>,
    rate_limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    envelope_sweep_interval: Duration,
    session_sweep_interval: Duration,
    bucket_sweep_interval: Duration,
    session_idle_timeout: Duration,
}

impl Reaper {
    /// Creates a reaper over the given components and cadences.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: Arc<MessagePool>,
        sessions: Arc<SessionRegistry>,
        rate_limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
        envelope_sweep_interval: Duration,
        session_sweep_interval: Duration,
        bucket_sweep_interval: Duration,
        session_idle_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            sessions,
            rate_limiter,
            clock,
            envelope_sweep_interval,
            session_sweep_interval,
            bucket_sweep_interval,
            session_idle_timeout,
        }
    }

    /// Runs one envelope-expiry sweep and returns the number evicted.
    pub fn sweep_envelopes(&self) -> usize {
        let count = self.pool.expire_before(self.clock.now());
        if count > 0 {
            info!(count, "envelope sweep evicted expired envelopes");
        }
        count
    }

    /// Runs one idle-session sweep and returns the number evicted.
    pub fn sweep_sessions(&self) -> usize {
        let count = self.sessions.sweep_idle(self.session_idle_timeout);
        if count > 0 {
            info!(count, "session sweep evicted idle sessions");
        }
        count
    }

    /// Runs one stale-bucket sweep and returns the number evicted.
    pub fn sweep_buckets(&self) -> usize {
        self.rate_limiter.sweep_stale()
    }

    /// Spawns the three sweep loops, stopping all of them once `shutdown`
    /// observes `true`. Returns a [`JoinSet`] the caller can await to know
    /// when every loop has exited.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinSet<()> {
        let mut tasks = JoinSet::new();

        tasks.spawn(sweep_loop(
            self.clone(),
            self.envelope_sweep_interval,
            shutdown.clone(),
            |r| r.sweep_envelopes(),
        ));
        tasks.spawn(sweep_loop(
            self.clone(),
            self.session_sweep_interval,
            shutdown.clone(),
            |r| r.sweep_sessions(),
        ));
        let bucket_interval = self.bucket_sweep_interval;
        tasks.spawn(sweep_loop(self, bucket_interval, shutdown, |r| {
            r.sweep_buckets()
        }));

        tasks
    }
}

async fn sweep_loop(
    reaper: Arc<Reaper>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    sweep: impl Fn(&Reaper) -> usize,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                sweep(&reaper);
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clock::FakeClock;
    use crate::envelope::{Envelope, Hop};
    use std::time::Instant;

    fn reaper() -> (Reaper, Arc<MessagePool>, Arc<SessionRegistry>, FakeClock) {
        let clock = FakeClock::new();
        let pool = Arc::new(MessagePool::new());
        let sessions = Arc::new(SessionRegistry::new(Arc::new(clock.clone())));
        let rate_limiter = Arc::new(RateLimiter::new(
            100,
            Duration::from_secs(60),
            Arc::new(clock.clone()),
        ));

        let reaper = Reaper::new(
            pool.clone(),
            sessions.clone(),
            rate_limiter,
            Arc::new(clock.clone()),
            Duration::from_secs(300),
            Duration::from_secs(60),
            Duration::from_secs(60),
            Duration::from_secs(300),
        );

        (reaper, pool, sessions, clock)
    }

    #[test]
    fn sweep_envelopes_evicts_expired() {
        let (reaper, pool, _sessions, clock) = reaper();

        pool.insert(Envelope {
            id: "m1".to_string(),
            recipient_code: "R".to_string(),
            payload: "x".to_string(),
            auth_tag: String::new(),
            created_at: Instant::now(),
            ttl: Duration::from_secs(1),
            timestamp_ms: 0,
            attempts: 0,
            max_attempts: 3,
            hop: Hop::Published,
        });

        clock.advance(Duration::from_secs(2));

        assert_eq!(reaper.sweep_envelopes(), 1);
        assert_eq!(pool.size(), 0);
    }

    #[tokio::test]
    async fn spawn_stops_all_loops_on_shutdown() {
        let (reaper, _pool, _sessions, _clock) = reaper();
        let (tx, rx) = watch::channel(false);

        let mut tasks = Arc::new(reaper).spawn(rx);
        tx.send(true).unwrap();

        while tasks.join_next().await.is_some() {}
    }
}
