use std::time::{Duration, Instant};

/// Token bucket with continuous refill.
///
/// Tokens are tracked as a float so fractional refill accumulates between
/// checks; the balance never exceeds `burst`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    burst: u32,
    tokens: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a full bucket holding `burst` tokens.
    pub fn new(burst: u32, refill_rate: f64) -> Self {
        Self {
            burst,
            tokens: burst as f64,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    /// Takes `tokens` from the bucket if the balance allows it.
    pub fn try_consume(&mut self, tokens: u32) -> bool {
        self.refill();

        if self.tokens >= tokens as f64 {
            self.tokens -= tokens as f64;
            true
        } else {
            false
        }
    }

    pub fn available_tokens(&mut self) -> u32 {
        self.refill();
        self.tokens.floor() as u32
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// How long until `tokens` are available, or `None` if they already are.
    ///
    /// A bucket that never refills reports `Duration::MAX`.
    pub fn time_until_available(&mut self, tokens: u32) -> Option<Duration> {
        self.refill();

        if self.tokens >= tokens as f64 {
            return None;
        }

        if self.refill_rate <= 0.0 {
            return Some(Duration::MAX);
        }

        let deficit = tokens as f64 - self.tokens;
        Some(Duration::try_from_secs_f64(deficit / self.refill_rate).unwrap_or(Duration::MAX))
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);

        if elapsed > Duration::from_millis(1) {
            let tokens_to_add = self.refill_rate * elapsed.as_secs_f64();

            // Cap at burst so idle periods cannot bank extra capacity
            self.tokens = (self.tokens + tokens_to_add).min(self.burst as f64);
            self.last_refill = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_bucket_starts_full() {
        let mut bucket = TokenBucket::new(10, 2.0);
        assert_eq!(bucket.burst(), 10);
        assert_eq!(bucket.refill_rate(), 2.0);
        assert_eq!(bucket.available_tokens(), 10);
    }

    #[test]
    fn test_token_consumption() {
        let mut bucket = TokenBucket::new(10, 2.0);
        assert!(bucket.try_consume(5));
        assert_eq!(bucket.available_tokens(), 5);
        assert!(bucket.try_consume(5));
        assert_eq!(bucket.available_tokens(), 0);
        assert!(!bucket.try_consume(1));
    }

    #[test]
    fn test_burst_bound() {
        // No more than `burst` immediate admissions.
        let mut bucket = TokenBucket::new(3, 0.5);
        for _ in 0..3 {
            assert!(bucket.try_consume(1));
        }
        assert!(!bucket.try_consume(1));
    }

    #[test]
    fn test_burst_overflow_prevention() {
        let mut bucket = TokenBucket::new(5, 1000.0); // Very high refill rate
        bucket.try_consume(3);

        thread::sleep(Duration::from_millis(10));

        // Even with high refill rate, tokens should not exceed burst
        assert!(bucket.available_tokens() <= 5);
        assert_eq!(bucket.available_tokens(), 5);
    }

    #[test]
    fn test_time_until_available() {
        let mut bucket = TokenBucket::new(2, 10.0);
        assert!(bucket.time_until_available(1).is_none());

        bucket.try_consume(2);
        let wait = bucket.time_until_available(1).unwrap();
        assert!(wait <= Duration::from_millis(100));
        assert!(wait > Duration::ZERO);
    }

    #[test]
    fn test_zero_refill_rate_never_recovers() {
        let mut bucket = TokenBucket::new(2, 0.0);
        assert!(bucket.try_consume(2));
        assert_eq!(bucket.time_until_available(1), Some(Duration::MAX));
    }
}
