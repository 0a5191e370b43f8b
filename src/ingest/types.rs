// src/ingest/types.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// A single-instrument price observation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    #[serde(default)]
    pub change_percent: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// One daily closing price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

/// Latest observation of an economic series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesPoint {
    pub value: f64,
    /// Year-over-year (or period-over-period) change in percent.
    #[serde(default)]
    pub pct_change: Option<f64>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MacroData {
    #[serde(default)]
    pub inflation: BTreeMap<String, SeriesPoint>,
    #[serde(default)]
    pub growth: BTreeMap<String, SeriesPoint>,
    #[serde(default)]
    pub labor: BTreeMap<String, SeriesPoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FixedIncomeData {
    #[serde(default)]
    pub rates: BTreeMap<String, SeriesPoint>,
    /// Tenor (or derived spread such as `spread_2s10s`) -> yield in percent.
    #[serde(default)]
    pub yield_curve: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub credit: BTreeMap<String, SeriesPoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EquityData {
    #[serde(default)]
    pub us: BTreeMap<String, Quote>,
    #[serde(default)]
    pub global: BTreeMap<String, Quote>,
    /// Sector -> daily change in percent.
    #[serde(default)]
    pub sectors: BTreeMap<String, f64>,
    #[serde(default)]
    pub vix: Option<Quote>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FxData {
    #[serde(default)]
    pub dxy: Option<Quote>,
    #[serde(default)]
    pub dm_pairs: BTreeMap<String, Quote>,
    #[serde(default)]
    pub em_pairs: BTreeMap<String, Quote>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CommodityData {
    #[serde(default)]
    pub precious: BTreeMap<String, Quote>,
    #[serde(default)]
    pub energy: BTreeMap<String, Quote>,
    #[serde(default)]
    pub agriculture: BTreeMap<String, Quote>,
}

impl CommodityData {
    pub fn find(&self, name: &str) -> Option<&Quote> {
        self.precious
            .get(name)
            .or_else(|| self.energy.get(name))
            .or_else(|| self.agriculture.get(name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CryptoOverview {
    pub total_market_cap: f64,
    #[serde(default)]
    pub btc_dominance: Option<f64>,
    #[serde(default)]
    pub market_cap_change_24h: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FearGreed {
    pub value: f64,
    pub label: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CryptoData {
    #[serde(default)]
    pub assets: BTreeMap<String, Quote>,
    #[serde(default)]
    pub market_overview: Option<CryptoOverview>,
    #[serde(default)]
    pub fear_greed: Option<FearGreed>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubredditSentiment {
    pub subreddit: String,
    pub score: f64,
    pub bullish_ratio: f64,
    pub post_count: u32,
    #[serde(default)]
    pub top_tickers: Vec<(String, u32)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SentimentData {
    /// -1.0 (bearish) ..= 1.0 (bullish).
    pub overall_score: f64,
    pub bullish_ratio: f64,
    #[serde(default)]
    pub total_posts: u32,
    #[serde(default)]
    pub trending_tickers: Vec<(String, u32)>,
    #[serde(default)]
    pub subreddits: Vec<SubredditSentiment>,
}

/// Snapshot categories, in registration (and merge) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Macro,
    Equities,
    FixedIncome,
    Fx,
    Commodities,
    Crypto,
    Sentiment,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Macro,
        Category::Equities,
        Category::FixedIncome,
        Category::Fx,
        Category::Commodities,
        Category::Crypto,
        Category::Sentiment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Macro => "macro",
            Category::Equities => "equities",
            Category::FixedIncome => "fixed_income",
            Category::Fx => "fx",
            Category::Commodities => "commodities",
            Category::Crypto => "crypto",
            Category::Sentiment => "sentiment",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one category fetch, tagged with its category.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryPayload {
    Macro(MacroData),
    Equities(EquityData),
    FixedIncome(FixedIncomeData),
    Fx(FxData),
    Commodities(CommodityData),
    Crypto(CryptoData),
    Sentiment(SentimentData),
}

impl CategoryPayload {
    pub fn category(&self) -> Category {
        match self {
            CategoryPayload::Macro(_) => Category::Macro,
            CategoryPayload::Equities(_) => Category::Equities,
            CategoryPayload::FixedIncome(_) => Category::FixedIncome,
            CategoryPayload::Fx(_) => Category::Fx,
            CategoryPayload::Commodities(_) => Category::Commodities,
            CategoryPayload::Crypto(_) => Category::Crypto,
            CategoryPayload::Sentiment(_) => Category::Sentiment,
        }
    }
}

/// A typed payload or an error marker, always timestamped.
#[derive(Debug)]
pub struct SourceResult<T> {
    pub fetched_at: DateTime<Utc>,
    pub outcome: Result<T>,
}

impl<T> SourceResult<T> {
    pub fn now(outcome: Result<T>) -> Self {
        Self {
            fetched_at: Utc::now(),
            outcome,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Re-invocable fetch used by the aggregator for one category or quick item.
pub type FeedFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Liveness probe, object safe so every adapter can sit in one health map.
#[async_trait::async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &'static str;
    /// Cheap probe against the provider, bypassing cache and rate limiter.
    async fn health_check(&self) -> bool;
}

/// Uniform contract of every provider adapter.
#[async_trait::async_trait]
pub trait SourceAdapter: HealthCheck {
    type Latest: Serialize + Send;

    /// The adapter's default payload, used by batch refresh jobs.
    async fn fetch_latest(&self) -> Result<Option<Self::Latest>>;
}
