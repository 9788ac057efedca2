//! Throttle for outbound chain queries
//!
//! A `governor` GCRA limiter with a burst of one: grants are spaced at least
//! `1s / rate` apart, so idle time never banks a burst and no rolling
//! one-second window sees more than `rate` grants. Time comes from tokio, so
//! waits are cancellable through the cycle's [`CancelScope`] and follow a
//! paused test clock.

use governor::clock::Clock;
use governor::middleware::NoOpMiddleware;
use governor::nanos::Nanos;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use nonzero_ext::nonzero;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::context::CancelScope;
use crate::error::{Result, SyncError};

/// Added to the emission interval so grants exactly one period apart never
/// land `rate + 1` in a closed one-second window
const SPACING_MARGIN: Duration = Duration::from_micros(1);

/// Clock reading tokio time relative to the limiter's creation
#[derive(Debug, Clone)]
struct TokioClock {
    origin: Instant,
}

impl Clock for TokioClock {
    type Instant = Nanos;

    fn now(&self) -> Nanos {
        Nanos::from(self.origin.elapsed())
    }
}

type Gcra = governor::RateLimiter<NotKeyed, InMemoryState, TokioClock, NoOpMiddleware<Nanos>>;

pub struct RateLimiter {
    rate_per_second: u32,
    clock: TokioClock,
    limiter: Gcra,
}

impl RateLimiter {
    pub fn new(rate_per_second: u32) -> Result<Self> {
        if rate_per_second == 0 {
            return Err(SyncError::Configuration(
                "rate limit must be at least one request per second".to_string(),
            ));
        }
        let period = Duration::from_secs(1) / rate_per_second + SPACING_MARGIN;
        let quota = Quota::with_period(period)
            .ok_or_else(|| SyncError::Configuration(format!("invalid rate limit period {:?}", period)))?
            .allow_burst(nonzero!(1u32));

        let clock = TokioClock {
            origin: Instant::now(),
        };
        let limiter = governor::RateLimiter::direct_with_clock(quota, &clock);
        Ok(Self {
            rate_per_second,
            clock,
            limiter,
        })
    }

    pub fn rate_per_second(&self) -> u32 {
        self.rate_per_second
    }

    /// Wait for a grant, giving up when the scope ends
    pub async fn acquire(&self, scope: &CancelScope) -> Result<()> {
        loop {
            scope.check()?;
            let wait = match self.limiter.check() {
                Ok(()) => return Ok(()),
                Err(not_until) => not_until.wait_time_from(self.clock.now()),
            };
            tokio::select! {
                biased;
                err = scope.done() => return Err(err),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Take a grant without waiting
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rate_per_second", &self.rate_per_second)
            .finish()
    }
}
