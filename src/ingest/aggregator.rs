// src/ingest/aggregator.rs
//! Fan-out to every registered category feed, fan back in to one [`Snapshot`].
//!
//! Each category is owned by exactly one feed. Feeds run concurrently under
//! the category timeout; results are merged in registration order so two
//! runs over identical inputs produce identical snapshots whatever finishes
//! first. A failing feed leaves its field `None` and adds one
//! [`SourceError`]; it never aborts the snapshot.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Timeouts;
use crate::fanout::{gather_ordered, NamedTask};
use crate::ingest::providers::Sources;
use crate::ingest::types::{
    Category, CategoryPayload, CommodityData, CryptoData, EquityData, FeedFn, FixedIncomeData,
    FxData, HealthCheck, MacroData, SentimentData,
};
use crate::telemetry::ensure_metrics_described;

/// Fixed key set of [`Aggregator::quick_snapshot`], besides `timestamp`.
pub const QUICK_KEYS: [&str; 6] = ["spx", "vix", "dxy", "bitcoin", "gold", "yield_curve"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceError {
    pub source: String,
    pub message: String,
}

/// One possibly-partial merge of every category at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "macro")]
    pub macro_data: Option<MacroData>,
    pub equities: Option<EquityData>,
    pub fixed_income: Option<FixedIncomeData>,
    pub fx: Option<FxData>,
    pub commodities: Option<CommodityData>,
    pub crypto: Option<CryptoData>,
    pub sentiment: Option<SentimentData>,
    #[serde(default)]
    pub errors: Vec<SourceError>,
}

impl Snapshot {
    /// All fields empty, no errors.
    pub fn empty() -> Self {
        Self {
            timestamp: Utc::now(),
            macro_data: None,
            equities: None,
            fixed_income: None,
            fx: None,
            commodities: None,
            crypto: None,
            sentiment: None,
            errors: Vec::new(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has(&self, category: Category) -> bool {
        match category {
            Category::Macro => self.macro_data.is_some(),
            Category::Equities => self.equities.is_some(),
            Category::FixedIncome => self.fixed_income.is_some(),
            Category::Fx => self.fx.is_some(),
            Category::Commodities => self.commodities.is_some(),
            Category::Crypto => self.crypto.is_some(),
            Category::Sentiment => self.sentiment.is_some(),
        }
    }

    fn assign(&mut self, payload: CategoryPayload) {
        match payload {
            CategoryPayload::Macro(v) => self.macro_data = Some(v),
            CategoryPayload::Equities(v) => self.equities = Some(v),
            CategoryPayload::FixedIncome(v) => self.fixed_income = Some(v),
            CategoryPayload::Fx(v) => self.fx = Some(v),
            CategoryPayload::Commodities(v) => self.commodities = Some(v),
            CategoryPayload::Crypto(v) => self.crypto = Some(v),
            CategoryPayload::Sentiment(v) => self.sentiment = Some(v),
        }
    }
}

/// Wrap an adapter method as a re-invocable feed.
pub fn feed_fn<S, T, F, Fut>(source: Arc<S>, f: F) -> FeedFn<T>
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    Arc::new(move || f(source.clone()).boxed())
}

fn to_json<T: Serialize>(fetched: Result<T>) -> Result<Value> {
    Ok(serde_json::to_value(fetched?)?)
}

async fn expect_category(
    expected: Category,
    fetch: BoxFuture<'static, Result<CategoryPayload>>,
) -> Result<CategoryPayload> {
    let payload = fetch.await?;
    if payload.category() != expected {
        return Err(anyhow!("feed returned {} payload", payload.category()));
    }
    Ok(payload)
}

pub struct Aggregator {
    feeds: Vec<(Category, FeedFn<CategoryPayload>)>,
    quick: Vec<(String, FeedFn<Value>)>,
    probes: Vec<Arc<dyn HealthCheck>>,
    timeouts: Timeouts,
}

impl Aggregator {
    pub fn new(timeouts: Timeouts) -> Self {
        Self {
            feeds: Vec::new(),
            quick: Vec::new(),
            probes: Vec::new(),
            timeouts,
        }
    }

    /// Register the feed owning `category`. Registering the same category
    /// again replaces the earlier feed in place.
    pub fn register_feed(&mut self, category: Category, feed: FeedFn<CategoryPayload>) -> &mut Self {
        match self.feeds.iter_mut().find(|(c, _)| *c == category) {
            Some(slot) => slot.1 = feed,
            None => self.feeds.push((category, feed)),
        }
        self
    }

    pub fn register_quick(&mut self, key: impl Into<String>, feed: FeedFn<Value>) -> &mut Self {
        let key = key.into();
        match self.quick.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = feed,
            None => self.quick.push((key, feed)),
        }
        self
    }

    pub fn register_probe(&mut self, probe: Arc<dyn HealthCheck>) -> &mut Self {
        self.probes.push(probe);
        self
    }

    pub fn categories(&self) -> Vec<Category> {
        self.feeds.iter().map(|(c, _)| *c).collect()
    }

    /// Standard wiring over the six provider adapters.
    pub fn from_sources(sources: &Sources, timeouts: Timeouts) -> Self {
        let mut agg = Self::new(timeouts);

        agg.register_feed(
            Category::Macro,
            feed_fn(sources.fred.clone(), |s| async move {
                s.macro_data().await.map(CategoryPayload::Macro)
            }),
        )
        .register_feed(
            Category::Equities,
            feed_fn(sources.equity.clone(), |s| async move {
                s.equity_data().await.map(CategoryPayload::Equities)
            }),
        )
        .register_feed(
            Category::FixedIncome,
            feed_fn(sources.fred.clone(), |s| async move {
                s.fixed_income_data().await.map(CategoryPayload::FixedIncome)
            }),
        )
        .register_feed(
            Category::Fx,
            feed_fn(sources.fx.clone(), |s| async move {
                s.fx_summary().await.map(CategoryPayload::Fx)
            }),
        )
        .register_feed(
            Category::Commodities,
            feed_fn(sources.commodity.clone(), |s| async move {
                s.commodity_summary().await.map(CategoryPayload::Commodities)
            }),
        )
        .register_feed(
            Category::Crypto,
            feed_fn(sources.crypto.clone(), |s| async move {
                s.crypto_data().await.map(CategoryPayload::Crypto)
            }),
        )
        .register_feed(
            Category::Sentiment,
            feed_fn(sources.reddit.clone(), |s| async move {
                s.overall_sentiment().await.map(CategoryPayload::Sentiment)
            }),
        );

        agg.register_quick(
            "spx",
            feed_fn(sources.equity.clone(), |s| async move {
                to_json(s.quote("^GSPC").await)
            }),
        )
        .register_quick(
            "vix",
            feed_fn(sources.equity.clone(), |s| async move {
                to_json(s.vix().await)
            }),
        )
        .register_quick(
            "dxy",
            feed_fn(sources.fx.clone(), |s| async move {
                to_json(s.dxy().await)
            }),
        )
        .register_quick(
            "bitcoin",
            feed_fn(sources.crypto.clone(), |s| async move {
                to_json(s.coin("bitcoin").await)
            }),
        )
        .register_quick(
            "gold",
            feed_fn(sources.commodity.clone(), |s| async move {
                to_json(s.commodity("gold").await)
            }),
        )
        .register_quick(
            "yield_curve",
            feed_fn(sources.fred.clone(), |s| async move {
                to_json(s.yield_curve().await)
            }),
        );

        for probe in sources.health_probes() {
            agg.register_probe(probe);
        }
        agg
    }

    /// Fetch every registered category concurrently and merge the outcomes.
    /// Never fails: every failure ends up in `Snapshot::errors`.
    pub async fn snapshot(&self) -> Snapshot {
        ensure_metrics_described();
        let started = Instant::now();

        let tasks: Vec<NamedTask<CategoryPayload>> = self
            .feeds
            .iter()
            .map(|(category, feed)| {
                let task = expect_category(*category, feed());
                (category.as_str().to_string(), task.boxed())
            })
            .collect();

        let mut snap = Snapshot::empty();
        for (name, result) in gather_ordered(tasks, self.timeouts.category()).await {
            match result.outcome {
                Ok(payload) => snap.assign(payload),
                Err(e) => {
                    tracing::warn!(category = %name, error = ?e, "category fetch failed");
                    counter!("aggregator_category_failures_total", "category" => name.clone())
                        .increment(1);
                    snap.errors.push(SourceError {
                        source: name,
                        message: format!("{e:#}"),
                    });
                }
            }
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        histogram!("aggregator_snapshot_ms").record(elapsed_ms);
        tracing::info!(
            categories = self.feeds.len(),
            errors = snap.errors.len(),
            elapsed_ms,
            "snapshot complete"
        );
        snap
    }

    /// Small fixed set of single values under the short quick timeout.
    /// Failed items map to `null`; every registered key is always present.
    pub async fn quick_snapshot(&self) -> Map<String, Value> {
        let tasks: Vec<NamedTask<Value>> = self
            .quick
            .iter()
            .map(|(key, feed)| (key.clone(), feed()))
            .collect();

        let mut out = Map::new();
        for (key, result) in gather_ordered(tasks, self.timeouts.quick()).await {
            let value = match result.outcome {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(item = %key, error = ?e, "quick item failed");
                    Value::Null
                }
            };
            out.insert(key, value);
        }
        out.insert("timestamp".into(), Value::String(Utc::now().to_rfc3339()));
        out
    }

    /// Composite health map. A probe that panics or times out reads `false`.
    pub async fn health_check_all(&self) -> BTreeMap<String, bool> {
        let tasks: Vec<NamedTask<bool>> = self
            .probes
            .iter()
            .map(|probe| {
                let p = probe.clone();
                let fut = async move { Ok(p.health_check().await) };
                (probe.name().to_string(), fut.boxed())
            })
            .collect();

        gather_ordered(tasks, self.timeouts.health())
            .await
            .into_iter()
            .map(|(name, r)| (name, r.outcome.unwrap_or(false)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn ok_feed(payload: CategoryPayload) -> FeedFn<CategoryPayload> {
        Arc::new(move || {
            let p = payload.clone();
            async move { Ok::<_, anyhow::Error>(p) }.boxed()
        })
    }

    fn failing_feed(msg: &'static str) -> FeedFn<CategoryPayload> {
        Arc::new(move || async move { Err::<CategoryPayload, _>(anyhow!(msg)) }.boxed())
    }

    #[tokio::test]
    async fn empty_aggregator_yields_empty_snapshot() {
        let agg = Aggregator::new(Timeouts::default());
        let snap = agg.snapshot().await;
        assert!(snap.errors.is_empty());
        assert!(Category::ALL.iter().all(|c| !snap.has(*c)));
    }

    #[tokio::test]
    async fn re_registering_replaces_in_place() {
        let mut agg = Aggregator::new(Timeouts::default());
        agg.register_feed(Category::Fx, failing_feed("old"))
            .register_feed(Category::Crypto, ok_feed(CategoryPayload::Crypto(CryptoData::default())))
            .register_feed(Category::Fx, ok_feed(CategoryPayload::Fx(FxData::default())));

        assert_eq!(agg.categories(), vec![Category::Fx, Category::Crypto]);
        let snap = agg.snapshot().await;
        assert!(snap.errors.is_empty());
        assert!(snap.has(Category::Fx));
    }

    #[tokio::test]
    async fn mismatched_payload_is_an_error() {
        let mut agg = Aggregator::new(Timeouts::default());
        agg.register_feed(Category::Fx, ok_feed(CategoryPayload::Crypto(CryptoData::default())));
        let snap = agg.snapshot().await;
        assert!(snap.fx.is_none());
        assert!(snap.crypto.is_none());
        assert_eq!(snap.errors.len(), 1);
        assert_eq!(snap.errors[0].source, "fx");
        assert!(snap.errors[0].message.contains("crypto"));
    }

    #[tokio::test(start_paused = true)]
    async fn quick_snapshot_keeps_failed_keys_as_null() {
        let mut agg = Aggregator::new(Timeouts::default());
        agg.register_quick("spx", Arc::new(|| async { Ok::<_, anyhow::Error>(serde_json::json!(5000.0)) }.boxed()))
            .register_quick("vix", Arc::new(|| async { Err::<Value, _>(anyhow!("down")) }.boxed()))
            .register_quick(
                "gold",
                Arc::new(|| {
                    async {
                        tokio::time::sleep(std::time::Duration::from_secs(600)).await;
                        Ok::<_, anyhow::Error>(serde_json::json!(1.0))
                    }
                    .boxed()
                }),
            );

        let quick = agg.quick_snapshot().await;
        assert_eq!(quick["spx"], serde_json::json!(5000.0));
        assert_eq!(quick["vix"], Value::Null);
        assert_eq!(quick["gold"], Value::Null);
        assert!(quick["timestamp"].is_string());
        assert_eq!(quick.len(), 4);
    }

    struct Probe(&'static str, bool);

    #[async_trait]
    impl HealthCheck for Probe {
        fn name(&self) -> &'static str {
            self.0
        }
        async fn health_check(&self) -> bool {
            self.1
        }
    }

    #[tokio::test]
    async fn health_map_covers_every_probe() {
        let mut agg = Aggregator::new(Timeouts::default());
        agg.register_probe(Arc::new(Probe("fred", true)))
            .register_probe(Arc::new(Probe("crypto", false)));
        let health = agg.health_check_all().await;
        assert_eq!(health.get("fred"), Some(&true));
        assert_eq!(health.get("crypto"), Some(&false));
        assert_eq!(health.len(), 2);
    }
}
