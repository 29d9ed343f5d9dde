// novin/src/limiter.rs
//
// Token-bucket rate limiter guarding the assess entry point. Refill happens
// lazily against the injected clock; all mutation sits behind one mutex so
// admission decisions are serialized.

use chrono::DateTime;
use chrono::Utc;
use parking_lot::Mutex;

use crate::clock::SharedClock;

struct Bucket {
    tokens:      f64,
    last_refill: DateTime<Utc>,
}

pub struct RateLimiter {
    bucket:      Mutex<Bucket>,
    max_tokens:  f64,
    refill_rate: f64,
    clock:       SharedClock,
}

impl RateLimiter {
    pub fn new(clock: SharedClock, max_tokens: f64, refill_rate: f64) -> Self {
        let now = clock.now();
        Self {
            bucket: Mutex::new(Bucket {
                tokens:      max_tokens,
                last_refill: now,
            }),
            max_tokens,
            refill_rate,
            clock,
        }
    }

    /// Admit a call of the given cost, deducting on success.
    pub fn allow(&self, cost: f64) -> bool {
        let now = self.clock.now();
        let mut bucket = self.bucket.lock();

        let elapsed = (now - bucket.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
        bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        bucket.last_refill = now;

        if bucket.tokens >= cost {
            bucket.tokens -= cost;
            true
        } else {
            false
        }
    }

    pub fn available(&self) -> f64 {
        let now = self.clock.now();
        let bucket = self.bucket.lock();
        let elapsed = (now - bucket.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
        (bucket.tokens + elapsed * self.refill_rate).min(self.max_tokens)
    }
}
