// src/ingest/source.rs
//! Shared caching + rate-limiting policy for every provider adapter.
//!
//! Order per call: cache lookup (a hit costs no token), then one limiter
//! token, then the raw fetch. Only successful values are written back;
//! errors propagate uncached.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics::counter;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ingest::cache::{cache_key, Cache, CallArgs};
use crate::ingest::rate_limiter::{RateLimiter, RateLimiterRegistry};
use crate::ingest::upstream::Upstream;

/// Per-source `(cache_ttl, rate_limit)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePolicy {
    pub cache_ttl_secs: u64,
    pub requests_per_minute: u32,
}

impl SourcePolicy {
    pub const fn new(cache_ttl_secs: u64, requests_per_minute: u32) -> Self {
        Self {
            cache_ttl_secs,
            requests_per_minute,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

pub struct DataSource {
    name: &'static str,
    policy: SourcePolicy,
    cache: Cache,
    limiter: Arc<RateLimiter>,
    upstream: Arc<dyn Upstream>,
    health_timeout: Duration,
}

impl DataSource {
    pub fn new(
        name: &'static str,
        policy: SourcePolicy,
        cache: Cache,
        limiters: &RateLimiterRegistry,
        upstream: Arc<dyn Upstream>,
        health_timeout: Duration,
    ) -> Self {
        let limiter = limiters.get(name, policy.requests_per_minute);
        Self {
            name,
            policy,
            cache,
            limiter,
            upstream,
            health_timeout,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn policy(&self) -> SourcePolicy {
        self.policy
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Read-through / write-through wrapper around `fetch`.
    ///
    /// `ttl` overrides the source default for this call only.
    pub async fn fetch_with_policy<T, F, Fut>(
        &self,
        method: &str,
        args: &CallArgs,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let key = cache_key(self.name, method, args);

        if let Some(raw) = self.cache.get(&key).await {
            match serde_json::from_str::<T>(&raw) {
                Ok(v) => {
                    tracing::debug!(source = self.name, key = %key, "cache hit");
                    counter!("source_cache_hits_total", "source" => self.name).increment(1);
                    return Ok(v);
                }
                Err(e) => {
                    tracing::warn!(source = self.name, key = %key, error = %e, "stale cache shape, refetching");
                }
            }
        }
        counter!("source_cache_misses_total", "source" => self.name).increment(1);

        self.limiter.acquire(1.0).await;

        match fetch().await {
            Ok(v) => {
                match serde_json::to_string(&v) {
                    Ok(raw) => {
                        self.cache
                            .set(&key, &raw, ttl.unwrap_or_else(|| self.policy.cache_ttl()))
                            .await
                    }
                    Err(e) => {
                        tracing::warn!(source = self.name, key = %key, error = %e, "value not cacheable")
                    }
                }
                Ok(v)
            }
            Err(e) => {
                tracing::error!(source = self.name, method, error = ?e, "fetch error");
                counter!("source_fetch_errors_total", "source" => self.name).increment(1);
                Err(e)
            }
        }
    }

    /// Fetch `method(args)` from the upstream through the policy and decode it.
    pub async fn call<T>(&self, method: &str, args: CallArgs) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        self.call_with_ttl(method, args, None).await
    }

    pub async fn call_with_ttl<T>(&self, method: &str, args: CallArgs, ttl: Option<Duration>) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let upstream = self.upstream.clone();
        let source = self.name;
        let sent = args.clone();
        self.fetch_with_policy(method, &args, ttl, || async move {
            let raw = upstream.call(method, &sent).await?;
            serde_json::from_value::<T>(raw)
                .with_context(|| format!("{source}.{method}: unexpected payload shape"))
        })
        .await
    }

    /// Uncached, un-rate-limited probe bounded by the health timeout.
    pub async fn ping(&self) -> bool {
        match tokio::time::timeout(self.health_timeout, self.upstream.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(source = self.name, error = ?e, "health check failed");
                false
            }
            Err(_) => {
                tracing::warn!(source = self.name, timeout = ?self.health_timeout, "health check timed out");
                false
            }
        }
    }
}
