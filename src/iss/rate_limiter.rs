use parking_lot::Mutex;
use tokio::time::{sleep, Duration, Instant};

/// Token-bucket limiter shared by every `IssClient` call.
///
/// Holds at most `capacity` tokens (equal to the configured RPS, i.e. one second of
/// burst), refilling continuously at `rate` tokens/second. Callers block in
/// [`acquire`] until a token is available rather than being rejected, mirroring the
/// upstream `RateLimiter`'s "wait, don't fail" policy but generalized from a fixed
/// per-request delay to a refilling bucket so short bursts don't stall unnecessarily.
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate_per_second: f64) -> Self {
        let rate = rate_per_second.max(0.01);
        Self {
            rate,
            capacity: rate,
            state: Mutex::new(BucketState { tokens: rate, last_refill: Instant::now() }),
        }
    }

    /// Block until a token is available, then consume it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock();
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - state.tokens;
                    Some(Duration::from_secs_f64(deficit / self.rate))
                }
            };

            match wait {
                None => return,
                Some(delay) => sleep(delay).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant as StdInstant;

    #[tokio::test]
    async fn immediate_burst_up_to_capacity() {
        let bucket = TokenBucket::new(5.0);
        let start = StdInstant::now();
        for _ in 0..5 {
            bucket.acquire().await;
        }
        assert!(start.elapsed().as_millis() < 50, "initial burst should not wait");
    }

    #[tokio::test]
    async fn blocks_once_capacity_is_exhausted() {
        let bucket = TokenBucket::new(2.0);
        bucket.acquire().await;
        bucket.acquire().await;
        let start = StdInstant::now();
        bucket.acquire().await;
        assert!(start.elapsed().as_millis() >= 400, "third acquire should wait for refill");
    }
}
