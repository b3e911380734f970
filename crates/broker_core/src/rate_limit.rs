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

//! Token-bucket admission control, keyed by source network address.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::clock::Clock;

/// The result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A token was consumed; the request may proceed.
    Admitted,
    /// The bucket was empty; the caller should respond "too many requests"
    /// and do no further work.
    Rejected,
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    points: u32,
    window_start: Instant,
}

/// A per-source token bucket. Capacity and refill window are fixed for the
/// life of the limiter; buckets are created lazily on first use and swept
/// by the reaper once a full window has passed without consumption.
pub struct RateLimiter {
    capacity: u32,
    window: Duration,
    buckets: DashMap<String, Bucket>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Creates a limiter with the given capacity and refill window.
    pub fn new(capacity: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            capacity,
            window,
            buckets: DashMap::new(),
            clock,
        }
    }

    /// Admits or rejects a request from `source`, consuming one point on
    /// admission.
    pub fn admit(&self, source: &str) -> Admission {
        let now = self.clock.now();

        let mut bucket = self
            .buckets
            .entry(source.to_string())
            .or_insert(Bucket {
                points: self.capacity,
                window_start: now,
            });

        if now.duration_since(bucket.window_start) >= self.window {
            bucket.points = self.capacity;
            bucket.window_start = now;
        }

        if bucket.points == 0 {
            Admission::Rejected
        } else {
            bucket.points -= 1;
            Admission::Admitted
        }
    }

    /// Removes every bucket that has not been touched for a full refill
    /// window, i.e. that would refill to capacity on next use anyway.
    /// Returns the number of buckets removed.
    pub fn sweep_stale(&self) -> usize {
        let now = self.clock.now();
        let window = self.window;

        let stale: Vec<String> = self
            .buckets
            .iter()
            .filter(|entry| now.duration_since(entry.window_start) >= window)
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in stale {
            if self.buckets.remove(&key).is_some() {
                removed += 1;
            }
        }
        removed
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clock::FakeClock;

    fn limiter(capacity: u32, window: Duration) -> (RateLimiter, FakeClock) {
        let clock = FakeClock::new();
        let limiter = RateLimiter::new(capacity, window, Arc::new(clock.clone()));
        (limiter, clock)
    }

    #[test]
    fn admits_up_to_capacity_then_rejects() {
        let (limiter, _clock) = limiter(100, Duration::from_secs(60));

        for _ in 0..100 {
            assert_eq!(limiter.admit("1.2.3.4"), Admission::Admitted);
        }

        assert_eq!(limiter.admit("1.2.3.4"), Admission::Rejected);
    }

    #[test]
    fn resumes_after_window() {
        let (limiter, clock) = limiter(2, Duration::from_secs(60));

        assert_eq!(limiter.admit("a"), Admission::Admitted);
        assert_eq!(limiter.admit("a"), Admission::Admitted);
        assert_eq!(limiter.admit("a"), Admission::Rejected);

        clock.advance(Duration::from_secs(61));

        assert_eq!(limiter.admit("a"), Admission::Admitted);
    }

    #[test]
    fn buckets_are_independent_per_source() {
        let (limiter, _clock) = limiter(1, Duration::from_secs(60));

        assert_eq!(limiter.admit("a"), Admission::Admitted);
        assert_eq!(limiter.admit("b"), Admission::Admitted);
        assert_eq!(limiter.admit("a"), Admission::Rejected);
    }

    #[test]
    fn sweep_removes_only_stale_buckets() {
        let (limiter, clock) = limiter(5, Duration::from_secs(60));

        limiter.admit("stale");
        clock.advance(Duration::from_secs(61));
        limiter.admit("fresh");

        assert_eq!(limiter.sweep_stale(), 1);
        assert_eq!(limiter.buckets.len(), 1);
        assert!(limiter.buckets.contains_key("fresh"));
    }
}
