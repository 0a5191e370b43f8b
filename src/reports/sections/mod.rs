// src/reports/sections/mod.rs
//! One builder per report section. Every builder reads the same
//! [`SectionContext`] (one snapshot, one regime assessment per report) and
//! produces one typed section or an error.

pub mod assets;
pub mod forward;
pub mod macro_outlook;
pub mod pulse;
pub mod sentiment;
pub mod technicals;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::analyze::{implications, RegimeAssessment, RegimeClassifier, RegimeImplications};
use crate::ingest::Snapshot;
use crate::reports::models::ReportLevel;

pub use assets::AssetsBuilder;
pub use forward::ForwardBuilder;
pub use macro_outlook::MacroBuilder;
pub use pulse::PulseBuilder;
pub use sentiment::SentimentBuilder;
pub use technicals::TechnicalsBuilder;

/// Shared, read-only input of every section build.
#[derive(Debug, Clone)]
pub struct SectionContext {
    pub level: ReportLevel,
    pub snapshot: Arc<Snapshot>,
    pub regime: RegimeAssessment,
    pub implications: RegimeImplications,
}

impl SectionContext {
    pub fn new(level: ReportLevel, snapshot: Arc<Snapshot>, classifier: &dyn RegimeClassifier) -> Self {
        let regime = classifier.classify(&snapshot);
        let implications = implications(regime.regime);
        Self {
            level,
            snapshot,
            regime,
            implications,
        }
    }
}

#[async_trait]
pub trait SectionBuilder: Send + Sync {
    type Output: Send + 'static;

    fn name(&self) -> &'static str;
    async fn build(&self, ctx: &SectionContext) -> Result<Self::Output>;
}

/// `"consumer_staples"` -> `"Consumer Staples"`.
pub(crate) fn title_words(s: &str) -> String {
    s.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut c = w.chars();
            match c.next() {
                Some(first) => first.to_uppercase().collect::<String>() + c.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Join commentary fragments into sentences, or fall back.
pub(crate) fn sentences(parts: Vec<String>, fallback: &str) -> String {
    if parts.is_empty() {
        fallback.to_string()
    } else {
        format!("{}.", parts.join(". "))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Snapshot fixtures shared by the section tests.

    use chrono::{TimeZone, Utc};

    use crate::ingest::types::*;
    use crate::ingest::Snapshot;

    pub fn quote(symbol: &str, price: f64, change: f64) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            price,
            change_percent: Some(change),
            high: None,
            low: None,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap(),
        }
    }

    pub fn point(value: f64, pct: Option<f64>) -> SeriesPoint {
        SeriesPoint {
            value,
            pct_change: pct,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
        }
    }

    /// Calm, fully populated market: goldilocks-ish.
    pub fn full_snapshot() -> Snapshot {
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
        fi.rates.insert("treasury_10y".into(), point(4.1, None));
        fi.yield_curve.insert("2y".into(), Some(3.8));
        fi.yield_curve.insert("10y".into(), Some(4.1));
        fi.yield_curve.insert("spread_2s10s".into(), Some(0.3));
        fi.credit.insert("hy_spread".into(), point(2.8, None));
        s.fixed_income = Some(fi);

        let mut eq = EquityData::default();
        let mut spx = quote("^GSPC", 6000.0, 0.8);
        spx.high = Some(6030.0);
        spx.low = Some(5950.0);
        eq.us.insert("spx".into(), spx);
        eq.us.insert("nasdaq".into(), quote("^IXIC", 19500.0, 1.6));
        eq.global.insert("dax".into(), quote("^GDAXI", 22000.0, 0.2));
        eq.sectors.insert("technology".into(), 1.4);
        eq.sectors.insert("utilities".into(), -0.6);
        eq.sectors.insert("energy".into(), 0.1);
        eq.sectors.insert("financials".into(), 0.5);
        eq.vix = Some(quote("^VIX", 13.0, -2.0));
        s.equities = Some(eq);

        let mut fx = FxData::default();
        fx.dxy = Some(quote("DX-Y.NYB", 103.2, -0.4));
        fx.dm_pairs.insert("eurusd".into(), quote("EURUSD", 1.09, 0.3));
        fx.dm_pairs.insert("usdjpy".into(), quote("USDJPY", 152.0, 0.1));
        fx.em_pairs.insert("usdmxn".into(), quote("USDMXN", 17.1, -0.2));
        s.fx = Some(fx);

        let mut c = CommodityData::default();
        c.precious.insert("gold".into(), quote("GC=F", 2900.0, 0.6));
        c.energy.insert("wti_crude".into(), quote("CL=F", 70.0, -1.2));
        c.agriculture.insert("wheat".into(), quote("ZW=F", 550.0, 0.0));
        s.commodities = Some(c);

        let mut cr = CryptoData::default();
        cr.assets.insert("bitcoin".into(), quote("BTC", 95000.0, 3.5));
        cr.assets.insert("ethereum".into(), quote("ETH", 3400.0, 7.0));
        cr.fear_greed = Some(FearGreed {
            value: 78.0,
            label: "Extreme Greed".into(),
        });
        s.crypto = Some(cr);

        s.sentiment = Some(SentimentData {
            overall_score: 0.35,
            bullish_ratio: 0.66,
            total_posts: 420,
            trending_tickers: vec![("NVDA".into(), 40), ("TSLA".into(), 22)],
            subreddits: vec![
                SubredditSentiment {
                    subreddit: "wallstreetbets".into(),
                    score: 0.6,
                    bullish_ratio: 0.75,
                    post_count: 250,
                    top_tickers: vec![("NVDA".into(), 30)],
                },
                SubredditSentiment {
                    subreddit: "investing".into(),
                    score: -0.1,
                    bullish_ratio: 0.45,
                    post_count: 170,
                    top_tickers: vec![],
                },
            ],
        });
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_words_capitalizes_segments() {
        assert_eq!(title_words("consumer_staples"), "Consumer Staples");
        assert_eq!(title_words("energy"), "Energy");
        assert_eq!(title_words(""), "");
    }

    #[test]
    fn sentences_fall_back_when_empty() {
        assert_eq!(sentences(vec![], "Quiet."), "Quiet.");
        assert_eq!(sentences(vec!["A".into(), "B".into()], "x"), "A. B.");
    }
}
