// src/ingest/rate_limiter.rs
//! Token-bucket admission gate, one bucket per upstream source.
//!
//! Refill is lazy: every `acquire`/`try_acquire` first credits the tokens
//! accumulated since the previous refill (capped at `capacity`) and only then
//! debits. The refill-then-debit step always runs under the bucket mutex, so
//! concurrent callers can never push the bucket below zero.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dashmap::DashMap;
use metrics::histogram;
use tokio::time::Instant;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, rate: f64, capacity: f64) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;
    }
}

/// Float slack so a waiter that slept exactly `deficit / rate` is admitted.
const EPSILON: f64 = 1e-9;

#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    capacity: f64,
    bucket: Mutex<Bucket>,
    // Serializes blocking acquirers so they are admitted in arrival order.
    waiters: tokio::sync::Mutex<()>,
}

impl RateLimiter {
    /// `rate` in tokens per second, `capacity` is the maximum burst. The
    /// bucket starts full.
    pub fn new(rate: f64, capacity: f64) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 / 60.0 };
        let capacity = if capacity.is_finite() && capacity >= 1.0 {
            capacity
        } else {
            1.0
        };
        Self {
            rate,
            capacity,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            waiters: tokio::sync::Mutex::new(()),
        }
    }

    /// `rate = n / 60`, `capacity = n`. A zero budget is treated as 1/min.
    pub fn from_per_minute(requests_per_minute: u32) -> Self {
        let n = requests_per_minute.max(1) as f64;
        Self::new(n / 60.0, n)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    fn bucket(&self) -> MutexGuard<'_, Bucket> {
        match self.bucket.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }

    /// Wait until `n` tokens are available, debit them and return how long
    /// the caller was blocked, including time queued behind earlier
    /// acquirers (`Duration::ZERO` when admitted at once).
    ///
    /// Requests above `capacity` are clamped to `capacity`, otherwise they
    /// could never be satisfied.
    pub async fn acquire(&self, n: f64) -> Duration {
        let n = n.clamp(0.0, self.capacity);
        let entered = Instant::now();
        let _turn = self.waiters.lock().await;

        loop {
            let wait = {
                let mut b = self.bucket();
                b.refill(self.rate, self.capacity);
                if b.tokens + EPSILON >= n {
                    b.tokens = (b.tokens - n).max(0.0);
                    None
                } else {
                    Some(Duration::from_secs_f64((n - b.tokens) / self.rate))
                }
            };
            match wait {
                None => break,
                Some(w) => tokio::time::sleep(w).await,
            }
        }

        let waited = entered.elapsed();
        if !waited.is_zero() {
            histogram!("rate_limiter_wait_ms").record(waited.as_secs_f64() * 1_000.0);
        }
        waited
    }

    /// Same refill-then-debit step as [`acquire`](Self::acquire) but never
    /// waits. Returns whether the tokens were taken.
    pub fn try_acquire(&self, n: f64) -> bool {
        let n = n.max(0.0);
        if n > self.capacity {
            return false;
        }
        let mut b = self.bucket();
        b.refill(self.rate, self.capacity);
        if b.tokens + EPSILON >= n {
            b.tokens = (b.tokens - n).max(0.0);
            true
        } else {
            false
        }
    }

    /// Tokens currently in the bucket, after crediting elapsed time.
    pub fn available_tokens(&self) -> f64 {
        let mut b = self.bucket();
        b.refill(self.rate, self.capacity);
        b.tokens
    }
}

/// Named limiters, one per upstream source. Owned by whoever wires the
/// sources together; there is no process-global instance.
#[derive(Debug, Default)]
pub struct RateLimiterRegistry {
    limiters: DashMap<String, Arc<RateLimiter>>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the limiter registered under `name`, creating it with the given
    /// per-minute budget on first use. Later calls ignore `requests_per_minute`.
    pub fn get(&self, name: &str, requests_per_minute: u32) -> Arc<RateLimiter> {
        self.limiters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::from_per_minute(requests_per_minute)))
            .clone()
    }

    /// Drop one limiter (`Some(name)`) or all of them (`None`).
    pub fn reset(&self, name: Option<&str>) {
        match name {
            Some(n) => {
                self.limiters.remove(n);
            }
            None => self.limiters.clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}
