// src/reports/sections/pulse.rs
//! The day's narrative: regime, sentiment overlay, divergences, takeaways.

use anyhow::Result;
use async_trait::async_trait;

use crate::analyze::{Bias, MarketRegime};
use crate::reports::models::{
    Divergence, PulseSection, RegimeInfo, ReportLevel, SentimentInfo,
};
use crate::reports::sections::{SectionBuilder, SectionContext};

#[derive(Debug, Clone, Copy, Default)]
pub struct PulseBuilder;

#[async_trait]
impl SectionBuilder for PulseBuilder {
    type Output = PulseSection;

    fn name(&self) -> &'static str {
        "pulse"
    }

    async fn build(&self, ctx: &SectionContext) -> Result<PulseSection> {
        let sentiment = if ctx.level >= ReportLevel::Standard {
            ctx.snapshot.sentiment.as_ref().map(|s| SentimentInfo {
                overall_score: s.overall_score,
                bullish_ratio: s.bullish_ratio,
                trending_tickers: s.trending_tickers.clone(),
            })
        } else {
            None
        };

        let divergences = divergences(ctx.regime.regime, sentiment.as_ref());
        let big_narrative = narrative(ctx, sentiment.as_ref());
        let key_takeaways = takeaways(ctx);

        Ok(PulseSection {
            regime: RegimeInfo {
                regime: ctx.regime.regime,
                confidence: ctx.regime.confidence,
                description: ctx.regime.description.clone(),
                signals: ctx.regime.signals.clone(),
            },
            sentiment,
            divergences,
            big_narrative,
            key_takeaways,
        })
    }
}

fn divergences(regime: MarketRegime, sentiment: Option<&SentimentInfo>) -> Vec<Divergence> {
    let Some(s) = sentiment else {
        return Vec::new();
    };
    let pct = s.bullish_ratio * 100.0;
    let mut out = Vec::new();
    if matches!(regime, MarketRegime::RiskOff | MarketRegime::Stagflation) && s.bullish_ratio > 0.6 {
        out.push(Divergence {
            description: "Retail sentiment remains bullish despite risk-off signals".into(),
            data_signal: "Risk-off regime indicated by macro data".into(),
            sentiment_signal: format!("{pct:.0}% bullish sentiment"),
        });
    }
    if regime == MarketRegime::Goldilocks && s.bullish_ratio < 0.4 {
        out.push(Divergence {
            description: "Bearish sentiment despite favorable macro conditions".into(),
            data_signal: "Goldilocks regime with contained inflation and steady growth".into(),
            sentiment_signal: format!("Only {pct:.0}% bullish sentiment"),
        });
    }
    out
}

fn narrative(ctx: &SectionContext, sentiment: Option<&SentimentInfo>) -> String {
    let regime = ctx.regime.regime.title();
    let confidence = ctx.regime.confidence * 100.0;

    if ctx.level == ReportLevel::Brief {
        let short: String = ctx.regime.description.chars().take(100).collect();
        return format!("Markets in {regime} mode. Confidence: {confidence:.0}%. {short}...");
    }

    let mut text = format!(
        "Markets are currently in a **{regime}** environment (confidence: {confidence:.0}%). {}",
        ctx.regime.description
    );
    if let Some(s) = sentiment {
        let word = if s.bullish_ratio > 0.5 { "bullish" } else { "bearish" };
        text.push_str(&format!(
            "\n\nRetail sentiment is {word} with {:.0}% bullish positioning. ",
            s.bullish_ratio * 100.0
        ));
        if !s.trending_tickers.is_empty() {
            let top: Vec<&str> = s.trending_tickers.iter().take(5).map(|(t, _)| t.as_str()).collect();
            text.push_str(&format!("Trending tickers: {}.", top.join(", ")));
        }
    }
    text
}

fn takeaways(ctx: &SectionContext) -> Vec<String> {
    let imp = &ctx.implications;
    let mut out = Vec::new();
    match imp.equity_bias {
        Bias::Bullish => out.push("Equity bias: Bullish - favor risk assets".to_string()),
        Bias::Bearish => out.push("Equity bias: Bearish - defensive positioning warranted".to_string()),
        _ => {}
    }
    match imp.duration {
        Some("short") => out.push("Duration: Keep duration short in rising rate environment".to_string()),
        Some("long") => out.push("Duration: Extend duration for potential rate cuts".to_string()),
        _ => {}
    }
    out.extend(ctx.regime.signals.iter().take(3).cloned());
    out.truncate(ctx.level.pick([3, 5, 7]));
    out
}
