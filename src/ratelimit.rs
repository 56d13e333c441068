//! Per-principal sliding-window rate limiting.
//!
//! Each limiter remembers when it admitted requests for a key and counts only
//! those within the trailing minute. Admission is decided under the key's map
//! entry lock, so concurrent checks for one key never over-admit.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{clock::Clock, config::RateLimitConfig, error::RateLimited};

pub const WINDOW: Duration = Duration::MINUTE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Reject { retry_after: Duration },
}

impl Decision {
    pub fn into_result(self) -> Result<(), RateLimited> {
        match self {
            Decision::Admit => Ok(()),
            Decision::Reject { retry_after } => Err(RateLimited { retry_after }),
        }
    }
}

pub struct RateLimiter {
    name: &'static str,
    limit: u32,
    hits: DashMap<Uuid, VecDeque<OffsetDateTime>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(name: &'static str, limit: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            limit,
            hits: DashMap::new(),
            clock,
        }
    }

    /// Prunes the key's window, then admits and records `now` or rejects.
    /// A consumed slot is never handed back.
    pub fn check(&self, key: Uuid) -> Decision {
        let now = self.clock.now();
        let mut hits = self.hits.entry(key).or_default();

        while let Some(&oldest) = hits.front() {
            if now - oldest >= WINDOW {
                hits.pop_front();
            } else {
                break;
            }
        }

        if hits.len() >= self.limit as usize {
            let oldest = hits.front().copied().unwrap_or(now);
            let retry_after = (WINDOW - (now - oldest)).clamp(Duration::ZERO, WINDOW);
            debug!(limiter = self.name, %key, retry_after = %retry_after, "rate limited");
            return Decision::Reject { retry_after };
        }

        hits.push_back(now);
        Decision::Admit
    }

    pub fn enforce(&self, key: Uuid) -> Result<(), RateLimited> {
        self.check(key).into_result()
    }

    /// Drops keys with no admissions left inside the window.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.hits.retain(|_, hits| {
            let live = hits.back().is_some_and(|&last| now - last < WINDOW);
            if !live {
                removed += 1;
            }
            live
        });
        removed
    }
}

/// The named limiters shared by every request path.
pub struct RateLimits {
    pub create: RateLimiter,
    pub search: RateLimiter,
    pub general: RateLimiter,
}

impl RateLimits {
    pub fn new(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            create: RateLimiter::new("create", config.create_per_minute, clock.clone()),
            search: RateLimiter::new("search", config.search_per_minute, clock.clone()),
            general: RateLimiter::new("general", config.general_per_minute, clock),
        }
    }

    pub fn sweep(&self) -> usize {
        self.create.sweep() + self.search.sweep() + self.general.sweep()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use time::macros::datetime;

    fn limiter(limit: u32) -> (Arc<ManualClock>, RateLimiter) {
        let clock = Arc::new(ManualClock::new(datetime!(2024-03-01 12:00 UTC)));
        let limiter = RateLimiter::new("test", limit, clock.clone());
        (clock, limiter)
    }

    #[test]
    fn admits_up_to_limit_then_rejects() {
        let (clock, limiter) = limiter(5);
        let user = Uuid::new_v4();
        for _ in 0..5 {
            assert_eq!(limiter.check(user), Decision::Admit);
            clock.advance(Duration::seconds(1));
        }
        match limiter.check(user) {
            Decision::Reject { retry_after } => {
                assert!(retry_after > Duration::ZERO);
                // oldest admission was 5s ago
                assert_eq!(retry_after, Duration::seconds(55));
            }
            Decision::Admit => panic!("sixth call must be rejected"),
        }
    }

    #[test]
    fn readmits_once_oldest_leaves_window() {
        let (clock, limiter) = limiter(5);
        let user = Uuid::new_v4();
        for _ in 0..5 {
            assert_eq!(limiter.check(user), Decision::Admit);
        }
        clock.advance(Duration::seconds(59));
        assert!(matches!(limiter.check(user), Decision::Reject { .. }));
        clock.advance(Duration::seconds(1));
        assert_eq!(limiter.check(user), Decision::Admit);
    }

    #[test]
    fn rejected_calls_do_not_consume_quota() {
        let (clock, limiter) = limiter(1);
        let user = Uuid::new_v4();
        assert_eq!(limiter.check(user), Decision::Admit);
        for _ in 0..10 {
            clock.advance(Duration::seconds(5));
            assert!(matches!(limiter.check(user), Decision::Reject { .. }));
        }
        clock.advance(Duration::seconds(10));
        assert_eq!(limiter.check(user), Decision::Admit);
    }

    #[test]
    fn keys_are_independent() {
        let (_clock, limiter) = limiter(1);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        assert_eq!(limiter.check(alice), Decision::Admit);
        assert_eq!(limiter.check(bob), Decision::Admit);
        assert!(matches!(limiter.check(alice), Decision::Reject { .. }));
    }

    #[test]
    fn named_limiters_do_not_share_state() {
        let clock = Arc::new(ManualClock::new(datetime!(2024-03-01 12:00 UTC)));
        let limits = RateLimits::new(&RateLimitConfig::default(), clock);
        let user = Uuid::new_v4();
        for _ in 0..5 {
            limits.create.enforce(user).unwrap();
        }
        assert!(limits.create.enforce(user).is_err());
        assert!(limits.search.enforce(user).is_ok());
        assert!(limits.general.enforce(user).is_ok());
    }

    #[test]
    fn zero_limit_rejects_with_full_window() {
        let (_clock, limiter) = limiter(0);
        assert_eq!(
            limiter.check(Uuid::new_v4()),
            Decision::Reject { retry_after: WINDOW }
        );
    }

    #[test]
    fn concurrent_checks_never_over_admit() {
        let (_clock, limiter) = limiter(5);
        let user = Uuid::new_v4();
        let admitted = std::sync::atomic::AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..32 {
                s.spawn(|| {
                    if limiter.check(user) == Decision::Admit {
                        admitted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(admitted.into_inner(), 5);
    }

    #[test]
    fn sweep_drops_idle_keys() {
        let (clock, limiter) = limiter(5);
        let idle = Uuid::new_v4();
        let busy = Uuid::new_v4();
        limiter.check(idle);
        clock.advance(Duration::seconds(30));
        limiter.check(busy);
        clock.advance(Duration::seconds(31));
        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.hits.len(), 1);
    }

    #[test]
    fn sweep_tolerates_keys_added_concurrently() {
        let (clock, limiter) = limiter(5);
        for _ in 0..100 {
            limiter.check(Uuid::new_v4());
        }
        clock.advance(Duration::seconds(61));

        let stop = std::sync::atomic::AtomicBool::new(false);
        let removed = std::thread::scope(|s| {
            s.spawn(|| {
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    limiter.check(Uuid::new_v4());
                }
            });
            let mut removed = 0;
            for _ in 0..2_000 {
                removed += limiter.sweep();
            }
            stop.store(true, std::sync::atomic::Ordering::Relaxed);
            removed
        });
        // the 100 stale keys go; fresh keys inside the window stay
        assert!(removed >= 100);
        assert!(limiter.hits.iter().all(|e| !e.value().is_empty()));
    }
}
