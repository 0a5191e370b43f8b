// src/ingest/cache.rs
//! Best-effort key/value cache in front of every upstream call.
//!
//! `CacheStore` is the raw backend (fallible). `Cache` is what the sources
//! hold: it absorbs every backend error, logs it and degrades to "absent" /
//! no-op, so a dead cache only costs latency and provider load.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use metrics::counter;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

/// Raw key/value backend with per-key TTL and prefix scan.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    /// Delete every key under `prefix:`; returns how many were removed.
    async fn clear_prefix(&self, prefix: &str) -> Result<usize>;
    fn name(&self) -> &'static str;
}

/// In-process store. Entries past their deadline read as absent and are
/// dropped lazily.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, (String, Instant)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let hit = match self.entries.get(key) {
            Some(e) if e.1 > now => return Ok(Some(e.0.clone())),
            Some(_) => true,
            None => false,
        };
        if hit {
            self.entries.remove_if(key, |_, (_, deadline)| *deadline <= now);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let deadline = Instant::now() + ttl;
        self.entries
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<usize> {
        let scope = format!("{prefix}:");
        let before = self.entries.len();
        self.entries.retain(|k, _| !k.starts_with(&scope));
        Ok(before.saturating_sub(self.entries.len()))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Error-absorbing facade over a [`CacheStore`].
#[derive(Clone)]
pub struct Cache {
    store: Option<Arc<dyn CacheStore>>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store: Some(store) }
    }

    /// In-process cache backed by [`MemoryStore`].
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// No backend at all: every read misses, every write is dropped.
    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let store = self.store.as_ref()?;
        match store.get(key).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = ?e, key, backend = store.name(), "cache get failed");
                counter!("cache_backend_errors_total", "op" => "get").increment(1);
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Duration) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.set(key, value, ttl).await {
            tracing::warn!(error = ?e, key, backend = store.name(), "cache set failed");
            counter!("cache_backend_errors_total", "op" => "set").increment(1);
        }
    }

    pub async fn delete(&self, key: &str) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.delete(key).await {
            tracing::warn!(error = ?e, key, backend = store.name(), "cache delete failed");
            counter!("cache_backend_errors_total", "op" => "delete").increment(1);
        }
    }

    /// Returns the number of evicted keys, 0 when the backend is down.
    pub async fn clear_prefix(&self, prefix: &str) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };
        match store.clear_prefix(prefix).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = ?e, prefix, backend = store.name(), "cache clear failed");
                counter!("cache_backend_errors_total", "op" => "clear_prefix").increment(1);
                0
            }
        }
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("backend", &self.store.as_ref().map(|s| s.name()))
            .finish()
    }
}

/// Arguments of one logical upstream call, used for key derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallArgs {
    pub positional: Vec<String>,
    pub keyword: BTreeMap<String, String>,
}

impl CallArgs {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn positional<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            positional: args.into_iter().map(Into::into).collect(),
            keyword: BTreeMap::new(),
        }
    }

    pub fn with_kw(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.keyword.insert(key.into(), value.into());
        self
    }
}

/// Deterministic cache key: `source:method:arg1:...[:kwhash]`.
///
/// Arguments are escaped (`%`, `:` and `#` are percent-encoded) so a colon
/// inside an argument can never line up with an argument boundary. Keyword
/// arguments are sorted and reduced to the first 8 hex chars of their SHA-256.
pub fn cache_key(source: &str, method: &str, args: &CallArgs) -> String {
    let mut parts = Vec::with_capacity(args.positional.len() + 3);
    parts.push(escape_part(source));
    parts.push(escape_part(method));
    for a in &args.positional {
        parts.push(escape_part(a));
    }
    if !args.keyword.is_empty() {
        let mut hasher = Sha256::new();
        for (k, v) in &args.keyword {
            hasher.update(k.as_bytes());
            hasher.update([0u8]);
            hasher.update(v.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        let hex: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
        parts.push(format!("#{hex}"));
    }
    parts.join(":")
}

fn escape_part(s: &str) -> String {
    s.replace('%', "%25").replace(':', "%3A").replace('#', "%23")
}
