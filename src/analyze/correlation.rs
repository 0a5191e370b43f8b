// src/analyze/correlation.rs
//! Cross-asset return correlations for the pairs that say the most about the
//! current regime.
//!
//! Daily closes come through [`PriceHistory`]; returns are aligned by date
//! before the Pearson coefficient is taken. A pair whose history is missing
//! on either side is skipped, never guessed.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::ingest::types::DailyClose;
use crate::reports::models::CorrelationInsight;

pub const REGIME_PAIRS: [(&str, &str); 6] = [
    ("SPX", "VIX"),
    ("SPX", "Gold"),
    ("Gold", "DXY"),
    ("BTC", "SPX"),
    ("SPX", "US10Y"),
    ("WTI", "DXY"),
];

pub const WINDOW_DAYS: u32 = 30;

/// Daily closing prices by asset name (`"SPX"`, `"Gold"`, `"BTC"`, ...).
#[async_trait]
pub trait PriceHistory: Send + Sync {
    async fn daily_closes(&self, asset: &str, days: u32) -> Result<Vec<DailyClose>>;
}

/// `None` for fewer than two points or a flat series.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }
    Some((cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0))
}

/// Simple daily returns keyed by the date of the later close.
fn daily_returns(closes: &[DailyClose]) -> BTreeMap<NaiveDate, f64> {
    let by_date: BTreeMap<NaiveDate, f64> = closes.iter().map(|c| (c.date, c.close)).collect();
    let ordered: Vec<(&NaiveDate, &f64)> = by_date.iter().collect();
    ordered
        .windows(2)
        .filter(|w| *w[0].1 > 0.0)
        .map(|w| (*w[1].0, w[1].1 / w[0].1 - 1.0))
        .collect()
}

/// Correlation of daily returns over the dates both series share, rounded
/// to three decimals.
pub fn return_correlation(a: &[DailyClose], b: &[DailyClose]) -> Option<f64> {
    let ra = daily_returns(a);
    let rb = daily_returns(b);
    let (xs, ys): (Vec<f64>, Vec<f64>) = ra
        .iter()
        .filter_map(|(d, x)| rb.get(d).map(|y| (*x, *y)))
        .unzip();
    pearson(&xs, &ys).map(|c| (c * 1000.0).round() / 1000.0)
}

pub fn interpret(asset1: &str, asset2: &str, corr: f64) -> String {
    let band = if corr <= -0.6 {
        "high_neg"
    } else if corr <= -0.3 {
        "low_neg"
    } else if corr >= 0.6 {
        "high_pos"
    } else if corr >= 0.3 {
        "positive"
    } else {
        "low"
    };
    let specific = match (asset1, asset2, band) {
        ("SPX", "VIX", "high_neg") => Some("Normal risk-off behavior; VIX spikes on equity weakness"),
        ("SPX", "VIX", "low_neg") => Some("Complacent markets; VIX barely responds to moves"),
        ("SPX", "VIX", "positive") => {
            Some("Unusual: VIX rising with equities, check for hedging demand")
        }
        ("SPX", "Gold", "high_neg") => Some("Strong risk-off bid for gold"),
        ("SPX", "Gold", "low_neg") => Some("Gold trading independently of equities"),
        ("SPX", "Gold", "positive") => Some("Liquidity-driven tape lifting both equities and gold"),
        ("BTC", "SPX", "high_pos") => Some("Crypto trading as a risk asset alongside equities"),
        ("BTC", "SPX", "low") => Some("Crypto decoupling from traditional markets"),
        ("BTC", "SPX", "high_neg") => Some("Unusual: crypto behaving as an equity hedge"),
        _ => None,
    };
    let generic = match band {
        "high_neg" => "Strong negative correlation",
        "low_neg" => "Moderate negative correlation",
        "high_pos" => "Strong positive correlation",
        "positive" => "Moderate positive correlation",
        _ => "Weak correlation; assets trading independently",
    };
    specific.unwrap_or(generic).to_string()
}

pub struct CorrelationEngine {
    history: Arc<dyn PriceHistory>,
}

impl CorrelationEngine {
    pub fn new(history: Arc<dyn PriceHistory>) -> Self {
        Self { history }
    }

    /// One insight per [`REGIME_PAIRS`] entry that has enough shared history,
    /// in that order. Each asset is fetched once.
    pub async fn regime_correlations(&self, days: u32) -> Vec<CorrelationInsight> {
        let mut assets: Vec<&str> = REGIME_PAIRS.iter().flat_map(|(a, b)| [*a, *b]).collect();
        assets.sort_unstable();
        assets.dedup();

        let fetched = join_all(assets.iter().map(|asset| async move {
            (*asset, self.history.daily_closes(asset, days).await)
        }))
        .await;

        let mut series: BTreeMap<&str, Vec<DailyClose>> = BTreeMap::new();
        for (asset, result) in fetched {
            match result {
                Ok(closes) => {
                    series.insert(asset, closes);
                }
                Err(e) => warn!(asset, error = ?e, "price history unavailable"),
            }
        }

        let insights: Vec<CorrelationInsight> = REGIME_PAIRS
            .iter()
            .filter_map(|(a, b)| {
                let corr = return_correlation(series.get(a)?, series.get(b)?)?;
                Some(CorrelationInsight {
                    pair: format!("{a}/{b}"),
                    correlation: corr,
                    interpretation: interpret(a, b, corr),
                })
            })
            .collect();
        debug!(pairs = insights.len(), "regime correlations computed");
        insights
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::bail;

    pub fn closes(values: &[f64]) -> Vec<DailyClose> {
        let start = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| DailyClose {
                date: start + chrono::Days::new(i as u64),
                close: *v,
            })
            .collect()
    }

    /// SPX zig-zags, VIX mirrors it, Gold tracks SPX; nothing else exists.
    pub struct FakeHistory;

    #[async_trait]
    impl PriceHistory for FakeHistory {
        async fn daily_closes(&self, asset: &str, _days: u32) -> Result<Vec<DailyClose>> {
            match asset {
                "SPX" => Ok(closes(&[100.0, 102.0, 101.0, 104.0, 103.0, 106.0])),
                "VIX" => Ok(closes(&[20.0, 19.6, 19.8, 19.2, 19.4, 18.8])),
                "Gold" => Ok(closes(&[50.0, 51.0, 50.5, 52.0, 51.5, 53.0])),
                other => bail!("no history for {other}"),
            }
        }
    }

    #[test]
    fn pearson_extremes_and_degenerate_input() {
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap() + 1.0).abs() < 1e-12);
        assert!(pearson(&[1.0], &[1.0]).is_none());
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn returns_align_on_shared_dates() {
        let a = closes(&[100.0, 110.0, 99.0, 108.9]);
        // Same moves, but the first date is missing.
        let mut b = closes(&[0.0, 10.0, 9.0, 9.9]);
        b.remove(0);
        assert_eq!(return_correlation(&a, &b), Some(1.0));
    }

    #[test]
    fn interpretation_prefers_pair_specific_text() {
        assert!(interpret("SPX", "VIX", -0.8).starts_with("Normal risk-off"));
        assert_eq!(interpret("WTI", "DXY", -0.4), "Moderate negative correlation");
        assert!(interpret("BTC", "SPX", 0.1).contains("decoupling"));
    }

    #[tokio::test]
    async fn engine_skips_pairs_without_history() {
        let engine = CorrelationEngine::new(Arc::new(FakeHistory));
        let out = engine.regime_correlations(WINDOW_DAYS).await;
        let pairs: Vec<&str> = out.iter().map(|c| c.pair.as_str()).collect();
        assert_eq!(pairs, ["SPX/VIX", "SPX/Gold"]);
        assert!(out[0].correlation < -0.9, "{:?}", out[0]);
        assert!(out[1].correlation > 0.9, "{:?}", out[1]);
    }
}
