// src/reports/sections/technicals.rs
//! Classic floor-trader pivots for a handful of key assets, volatility regime
//! and positioning notes. Deep dives add cross-asset return correlations.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::analyze::correlation::WINDOW_DAYS;
use crate::analyze::{CorrelationEngine, PriceHistory};

use crate::ingest::types::Quote;
use crate::ingest::Snapshot;
use crate::reports::models::{
    PositioningView, ReportLevel, TechnicalLevel, TechnicalsSection, VolatilityView,
};
use crate::reports::sections::{SectionBuilder, SectionContext};

#[derive(Clone, Default)]
pub struct TechnicalsBuilder {
    correlations: Option<Arc<CorrelationEngine>>,
}

impl TechnicalsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Without price history a deep dive reports an empty correlation list.
    pub fn with_price_history(mut self, history: Arc<dyn PriceHistory>) -> Self {
        self.correlations = Some(Arc::new(CorrelationEngine::new(history)));
        self
    }
}

#[async_trait]
impl SectionBuilder for TechnicalsBuilder {
    type Output = TechnicalsSection;

    fn name(&self) -> &'static str {
        "technicals"
    }

    async fn build(&self, ctx: &SectionContext) -> Result<TechnicalsSection> {
        let snap = &ctx.snapshot;
        let key_levels: Vec<TechnicalLevel> = key_quotes(snap)
            .into_iter()
            .filter_map(|(name, q)| q.map(|q| pivot_levels(name, q)))
            .collect();
        let vix = snap.equities.as_ref().and_then(|e| e.vix.as_ref()).map(|q| q.price);
        if key_levels.is_empty() && vix.is_none() {
            bail!("no price data for technical levels");
        }

        let correlations = if ctx.level >= ReportLevel::Deep {
            Some(match &self.correlations {
                Some(engine) => engine.regime_correlations(WINDOW_DAYS).await,
                None => Vec::new(),
            })
        } else {
            None
        };

        Ok(TechnicalsSection {
            key_levels,
            volatility: volatility(vix),
            positioning: positioning(snap, ctx.level),
            correlations,
        })
    }
}

fn key_quotes(snap: &Snapshot) -> [(&'static str, Option<&Quote>); 4] {
    [
        ("SPX", snap.equities.as_ref().and_then(|e| e.us.get("spx"))),
        ("Gold", snap.commodities.as_ref().and_then(|c| c.find("gold"))),
        ("DXY", snap.fx.as_ref().and_then(|f| f.dxy.as_ref())),
        ("BTC", snap.crypto.as_ref().and_then(|c| c.assets.get("bitcoin"))),
    ]
}

/// P = (H + L + C) / 3, R1 = 2P - L, S1 = 2P - H, R2 = P + (H - L),
/// S2 = P - (H - L). Without a session range every level collapses to C.
pub fn pivot_levels(asset: &str, q: &Quote) -> TechnicalLevel {
    let close = q.price;
    let high = q.high.unwrap_or(close).max(close);
    let low = q.low.unwrap_or(close).min(close);
    let pivot = (high + low + close) / 3.0;
    let range = high - low;
    let trend = if close > pivot {
        "bullish"
    } else if close < pivot {
        "bearish"
    } else {
        "neutral"
    };
    TechnicalLevel {
        asset: asset.to_string(),
        current_price: close,
        pivot,
        support_1: 2.0 * pivot - high,
        support_2: pivot - range,
        resistance_1: 2.0 * pivot - low,
        resistance_2: pivot + range,
        trend: trend.to_string(),
    }
}

fn volatility(vix: Option<f64>) -> VolatilityView {
    let Some(v) = vix else {
        return VolatilityView {
            vix: None,
            vix_percentile: None,
            assessment: "Volatility data unavailable".to_string(),
        };
    };
    let (pct, assessment) = if v < 15.0 {
        (20.0, "VIX at historically low levels; complacency elevated")
    } else if v < 20.0 {
        (40.0, "VIX in normal range; balanced risk environment")
    } else if v < 25.0 {
        (60.0, "VIX elevated; some caution warranted")
    } else if v < 30.0 {
        (80.0, "VIX high; risk-off environment")
    } else {
        (95.0, "VIX extreme; crisis-level volatility")
    };
    VolatilityView {
        vix: Some(v),
        vix_percentile: Some(pct),
        assessment: assessment.to_string(),
    }
}

fn positioning(snap: &Snapshot, level: ReportLevel) -> Option<PositioningView> {
    if level < ReportLevel::Standard {
        return None;
    }
    let retail_sentiment = match &snap.sentiment {
        Some(s) if s.bullish_ratio > 0.55 => format!("Net bullish ({:.0}% bullish)", s.bullish_ratio * 100.0),
        Some(s) if s.bullish_ratio < 0.45 => format!("Net bearish ({:.0}% bullish)", s.bullish_ratio * 100.0),
        Some(_) => "Balanced retail positioning".to_string(),
        None => "Retail positioning unavailable".to_string(),
    };
    Some(PositioningView {
        retail_sentiment,
        institutional_flows: (level >= ReportLevel::Deep).then(|| "Awaiting CFTC COT data".to_string()),
    })
}
