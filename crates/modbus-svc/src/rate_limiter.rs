//! Per-target token-bucket rate limiting: one permit per second, burst 1,
//! keyed by `ip:port` so multiple field polls against the same PLC share
//! a budget.

use std::net::SocketAddr;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;

pub struct RateLimiterRegistry {
    limiter: DefaultKeyedRateLimiter<SocketAddr>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self {
            limiter: RateLimiter::keyed(Quota::per_second(nonzero!(1u32))),
        }
    }

    /// Await a permit for `addr`, or return early if `cancel` resolves first.
    pub async fn acquire(
        &self,
        addr: SocketAddr,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> bool {
        tokio::select! {
            _ = self.limiter.until_key_ready(&addr) => true,
            _ = cancel.cancelled() => false,
        }
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
