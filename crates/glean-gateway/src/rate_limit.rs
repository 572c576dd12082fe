use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, burst: f64, per_second: f64) {
        let gained = now.saturating_duration_since(self.refilled_at).as_secs_f64() * per_second;
        self.tokens = (self.tokens + gained).min(burst);
        self.refilled_at = now;
    }
}

/// Token buckets for intake clients, one per API key plus a shared
/// anonymous one.
pub struct RateLimiter {
    burst: f64,
    per_second: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    /// `burst` requests at once, refilled at `per_second`.
    pub fn new(burst: f64, per_second: f64) -> Self {
        Self {
            burst,
            per_second,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Takes one token for `client`.
    ///
    /// On rejection returns how long until the next token is available.
    pub async fn try_acquire(&self, client: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry(client.to_owned()).or_insert(Bucket {
            tokens: self.burst,
            refilled_at: now,
        });
        bucket.refill(now, self.burst, self.per_second);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(());
        }
        if self.per_second <= 0.0 {
            return Err(Duration::MAX);
        }
        let missing = 1.0 - bucket.tokens;
        Err(Duration::try_from_secs_f64(missing / self.per_second).unwrap_or(Duration::MAX))
    }

    /// Shorthand for [`try_acquire`](Self::try_acquire) when the wait is
    /// not needed.
    pub async fn check(&self, client: &str) -> bool {
        self.try_acquire(client).await.is_ok()
    }

    /// Forgets clients idle for at least `max_idle`.
    pub async fn cleanup(&self, max_idle: Duration) {
        let now = Instant::now();
        self.buckets
            .lock()
            .await
            .retain(|_, b| now.saturating_duration_since(b.refilled_at) < max_idle);
    }

    /// Number of tracked clients.
    pub async fn tracked_clients(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_is_allowed() {
        let limiter = RateLimiter::new(5.0, 1.0);
        for _ in 0..5 {
            assert!(limiter.check("key-a").await);
        }
        assert!(!limiter.check("key-a").await);
    }

    #[tokio::test]
    async fn clients_have_separate_buckets() {
        let limiter = RateLimiter::new(2.0, 0.1);
        assert!(limiter.check("key-a").await);
        assert!(limiter.check("key-a").await);
        assert!(!limiter.check("key-a").await);
        assert!(limiter.check("key-b").await);
        assert_eq!(limiter.tracked_clients().await, 2);
    }

    #[tokio::test]
    async fn rejection_reports_wait() {
        let limiter = RateLimiter::new(1.0, 2.0);
        assert!(limiter.try_acquire("c").await.is_ok());
        let wait = limiter.try_acquire("c").await.unwrap_err();
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_millis(500));

        let frozen = RateLimiter::new(1.0, 0.0);
        assert!(frozen.try_acquire("c").await.is_ok());
        assert_eq!(frozen.try_acquire("c").await.unwrap_err(), Duration::MAX);
    }

    #[tokio::test]
    async fn cleanup_drops_idle_buckets() {
        let limiter = RateLimiter::new(1.0, 1.0);
        limiter.check("key-a").await;
        assert_eq!(limiter.tracked_clients().await, 1);
        limiter.cleanup(Duration::ZERO).await;
        assert_eq!(limiter.tracked_clients().await, 0);
    }
}
