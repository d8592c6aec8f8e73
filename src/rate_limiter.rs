use std::time::Duration;

use dashmap::DashMap;
use tokio::time;

use crate::error::{Result, ServiceError};
use crate::token_bucket::TokenBucket;

/// One token bucket per client identity, created on first sight.
///
/// Lookups and inserts go through the map's sharded entry API, so two
/// requests racing to create the bucket for the same identity end up
/// sharing one, and unrelated identities never block each other.
///
/// Entries are never evicted; the map grows with the number of distinct
/// identities seen since process start. Acceptable at the intended scale.
pub struct RateLimiterRegistry {
    buckets: DashMap<String, TokenBucket>,
    rate: f64,
    burst: u32,
    timeout: Duration,
}

impl RateLimiterRegistry {
    pub fn new(rate: f64, burst: u32, timeout: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            rate,
            burst,
            timeout,
        }
    }

    /// Admits one request from `identity`, waiting up to the configured
    /// timeout for a token.
    ///
    /// Waiting is a plain sleep-and-retry loop: no token state is reserved
    /// while suspended, so dropping the future (client disconnect) leaks
    /// nothing. On timeout the request is rejected with `Backpressure`.
    pub async fn admit(&self, identity: &str) -> Result<()> {
        match time::timeout(self.timeout, self.wait_for_token(identity)).await {
            Ok(()) => Ok(()),
            Err(_) => {
                tracing::debug!(
                    target: "linkshortener::rate_limiter",
                    identity = %identity,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "rate limit wait timed out"
                );
                Err(ServiceError::Backpressure)
            }
        }
    }

    async fn wait_for_token(&self, identity: &str) {
        loop {
            // The shard guard must not be held across an await point, so
            // the consume attempt and the sleep live in separate scopes.
            let wait = {
                let mut bucket = self
                    .buckets
                    .entry(identity.to_string())
                    .or_insert_with(|| TokenBucket::new(self.burst, self.rate));

                if bucket.try_consume(1) {
                    return;
                }
                bucket.time_until_available(1).unwrap_or(Duration::ZERO)
            };

            time::sleep(wait.min(self.timeout)).await;
        }
    }

    /// Number of distinct identities observed so far.
    pub fn tracked_identities(&self) -> usize {
        self.buckets.len()
    }
}
