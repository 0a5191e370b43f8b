// tests/common/mod.rs
// Shared mocks for the integration tests. No network access anywhere.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};

use marketview::config::Settings;
use marketview::ingest::types::*;
use marketview::ingest::upstream::Upstream;
use marketview::ingest::{Cache, CacheStore, CallArgs, RateLimiterRegistry, Snapshot, Sources};
use marketview::llm::{GeneratorFactory, LlmProvider, TextGenerator};
use marketview::reports::SnapshotSource;

const TS: &str = "2026-03-02T15:00:00Z";

fn q(symbol: &str, price: f64, change: f64) -> Value {
    json!({"symbol": symbol, "price": price, "change_percent": change, "timestamp": TS})
}

fn p(value: f64, pct: Option<f64>) -> Value {
    json!({"value": value, "pct_change": pct, "timestamp": TS})
}

/// Canned gateway payload for `source.method(args)`.
pub fn canned(source: &str, method: &str, args: &[String]) -> Option<Value> {
    let v = match (source, method) {
        ("fred", "inflation") => json!({"cpi": p(310.0, Some(2.4)), "core_pce": p(120.0, Some(2.6))}),
        ("fred", "growth") => json!({"gdp_growth": p(2.0, None)}),
        ("fred", "labor") => json!({"unemployment": p(4.1, None)}),
        ("fred", "rates") => json!({"fed_funds": p(4.25, None), "treasury_10y": p(4.1, None)}),
        ("fred", "yield_curve") => json!({"2y": 3.8, "10y": 4.1, "spread_2s10s": 0.3}),
        ("fred", "credit") => json!({"hy_spread": p(2.8, None)}),
        ("equity", "us_indices") => json!({"spx": q("^GSPC", 6000.0, 0.8), "nasdaq": q("^IXIC", 19500.0, 1.6)}),
        ("equity", "global_indices") => json!({"dax": q("^GDAXI", 22000.0, 0.2)}),
        ("equity", "sectors") => json!({"technology": 1.4, "utilities": -0.6}),
        ("equity", "vix") => q("^VIX", 13.0, -2.0),
        ("equity", "quote") => q(args.first()?, 6000.0, 0.8),
        ("fx", "summary") => json!({"dxy": q("DX-Y.NYB", 103.2, -0.4), "dm_pairs": {"eurusd": q("EURUSD", 1.09, 0.3)}}),
        ("fx", "quote") => q("DX-Y.NYB", 103.2, -0.4),
        ("commodity", "summary") => json!({"precious": {"gold": q("GC=F", 2900.0, 0.6)}, "energy": {"wti_crude": q("CL=F", 70.0, -1.2)}}),
        ("commodity", "commodity") => q("GC=F", 2900.0, 0.6),
        ("crypto", "coins") => {
            let ids = args.first()?;
            let mut m = serde_json::Map::new();
            for id in ids.split(',') {
                m.insert(id.to_string(), q(&id.to_ascii_uppercase(), 100.0, 1.0));
            }
            Value::Object(m)
        }
        ("crypto", "market_overview") => Value::Null,
        ("crypto", "fear_greed") => json!({"value": 60.0, "label": "Greed"}),
        ("equity" | "fx" | "commodity" | "crypto", "history") => history(args.first()?, args.get(1)?.parse().ok()?),
        ("reddit", "sentiment") => json!({"overall_score": 0.2, "bullish_ratio": 0.55, "total_posts": 100}),
        _ => return None,
    };
    Some(v)
}

/// Zig-zag daily closes; the swing size depends on the symbol so series differ.
fn history(symbol: &str, days: u32) -> Value {
    let start = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
    let swing = 1.0 + symbol.len() as f64 / 10.0;
    let closes: Vec<Value> = (0..=days)
        .map(|i| {
            let close = 100.0 + f64::from(i) * 0.1 + if i % 2 == 0 { 0.0 } else { swing };
            let date = start + chrono::Days::new(u64::from(i));
            json!({"date": date.to_string(), "close": close})
        })
        .collect();
    Value::Array(closes)
}

/// Upstream for one named source answering from [`canned`].
pub struct MockUpstream {
    pub source: &'static str,
    pub fail: bool,
    pub delay: Duration,
    pub calls: AtomicUsize,
    /// Every `(method, args)` pair received, in call order.
    pub received: Mutex<Vec<(String, CallArgs)>>,
}

impl MockUpstream {
    pub fn new(source: &'static str) -> Self {
        Self {
            source,
            fail: false,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(source: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(source)
        }
    }

    pub fn delayed(source: &'static str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(source)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<(String, CallArgs)> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    async fn call(&self, method: &str, args: &CallArgs) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.received
            .lock()
            .unwrap()
            .push((method.to_string(), args.clone()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            bail!("{} upstream unavailable", self.source);
        }
        canned(self.source, method, &args.positional).ok_or_else(|| anyhow!("no route {}.{method}", self.source))
    }

    async fn ping(&self) -> Result<()> {
        if self.fail {
            bail!("{} down", self.source);
        }
        Ok(())
    }
}

/// Wire all six providers over mock upstreams; `failing` names sources that
/// always error, `delay_for` gives each source its latency.
pub fn mock_sources(
    cache: Cache,
    failing: &[&str],
    delay_for: impl Fn(&str) -> Duration,
) -> Result<Sources> {
    let failing: HashSet<String> = failing.iter().map(|s| s.to_string()).collect();
    let settings = Settings::default();
    let limiters = RateLimiterRegistry::new();
    Sources::with_upstreams(&settings, cache, &limiters, |name| {
        let up = if failing.contains(name) {
            MockUpstream::failing(name)
        } else {
            MockUpstream::delayed(name, delay_for(name))
        };
        Ok(Arc::new(up) as Arc<dyn Upstream>)
    })
}

/// Cache backend that is always down.
pub struct BrokenStore;

#[async_trait]
impl CacheStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        bail!("connection refused")
    }
    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
        bail!("connection refused")
    }
    async fn delete(&self, _key: &str) -> Result<()> {
        bail!("connection refused")
    }
    async fn clear_prefix(&self, _prefix: &str) -> Result<usize> {
        bail!("connection refused")
    }
    fn name(&self) -> &'static str {
        "broken"
    }
}

/// Hands out the same snapshot on every build.
pub struct FixedSnapshot(pub Snapshot);

#[async_trait]
impl SnapshotSource for FixedSnapshot {
    async fn snapshot(&self) -> Snapshot {
        self.0.clone()
    }
}

fn quote(symbol: &str, price: f64, change: f64) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        price,
        change_percent: Some(change),
        high: None,
        low: None,
        timestamp: Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap(),
    }
}

fn point(value: f64, pct: Option<f64>) -> SeriesPoint {
    SeriesPoint {
        value,
        pct_change: pct,
        timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
    }
}

/// Calm, fully populated market dated 2026-03-02.
pub fn calm_snapshot() -> Snapshot {
    let mut s = Snapshot::empty();
    s.timestamp = Utc.with_ymd_and_hms(2026, 3, 2, 15, 30, 0).unwrap();

    let mut m = MacroData::default();
    m.inflation.insert("cpi".into(), point(310.0, Some(2.4)));
    m.inflation.insert("core_pce".into(), point(120.0, Some(2.6)));
    m.growth.insert("gdp_growth".into(), point(2.0, None));
    m.labor.insert("unemployment".into(), point(4.1, None));
    s.macro_data = Some(m);

    let mut fi = FixedIncomeData::default();
    fi.rates.insert("fed_funds".into(), point(4.25, None));
    fi.yield_curve.insert("spread_2s10s".into(), Some(0.3));
    fi.credit.insert("hy_spread".into(), point(2.8, None));
    s.fixed_income = Some(fi);

    let mut eq = EquityData::default();
    eq.us.insert("spx".into(), quote("^GSPC", 6000.0, 0.8));
    eq.sectors.insert("technology".into(), 1.4);
    eq.vix = Some(quote("^VIX", 13.0, -2.0));
    s.equities = Some(eq);

    let mut cr = CryptoData::default();
    cr.assets.insert("bitcoin".into(), quote("BTC", 95000.0, 3.5));
    s.crypto = Some(cr);

    s.sentiment = Some(SentimentData {
        overall_score: 0.35,
        bullish_ratio: 0.66,
        total_posts: 420,
        trending_tickers: vec![("NVDA".into(), 40)],
        subreddits: vec![],
    });
    s
}

/// Replies in call order; `None` entries fail. Once the script runs out
/// every call fails.
pub struct ScriptedGenerator {
    script: Mutex<Vec<Option<String>>>,
    pub calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Option<&str>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().rev().map(|s| s.map(str::to_string)).collect()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Ollama
    }

    async fn generate(&self, _prompt: &str, _system_prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop().flatten();
        next.ok_or_else(|| anyhow!("provider error"))
    }
}

/// Routes by prompt content so concurrent enhancement units get stable
/// replies regardless of call order.
pub struct KeywordGenerator {
    pub replies: BTreeMap<&'static str, Option<&'static str>>,
}

#[async_trait]
impl TextGenerator for KeywordGenerator {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Ollama
    }

    async fn generate(&self, prompt: &str, _system_prompt: &str) -> Result<String> {
        for (needle, reply) in &self.replies {
            if prompt.contains(needle) {
                return reply.map(str::to_string).ok_or_else(|| anyhow!("provider error"));
            }
        }
        bail!("no reply scripted")
    }
}

/// Always hands out the same generator.
pub struct StaticFactory(pub Arc<dyn TextGenerator>);

impl GeneratorFactory for StaticFactory {
    fn generator(&self, _provider: LlmProvider, _model: Option<&str>) -> Result<Arc<dyn TextGenerator>> {
        Ok(self.0.clone())
    }
}

/// Construction always fails, like a provider with no API key.
pub struct NoKeyFactory;

impl GeneratorFactory for NoKeyFactory {
    fn generator(&self, provider: LlmProvider, _model: Option<&str>) -> Result<Arc<dyn TextGenerator>> {
        bail!("{} is not configured", provider.key_env_var().unwrap_or("API key"))
    }
}
