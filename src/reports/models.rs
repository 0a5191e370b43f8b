// src/reports/models.rs
//! Report and section records. Everything here is plain data; sections are
//! produced once by their builder and only ever replaced wholesale.

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::MarketRegime;
use crate::ingest::types::{CryptoOverview, FearGreed, Quote};
use crate::llm::LlmProvider;

/// Report depth, ordered brief < standard < deep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportLevel {
    Brief = 1,
    Standard = 2,
    Deep = 3,
}

impl ReportLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportLevel::Brief => "brief",
            ReportLevel::Standard => "standard",
            ReportLevel::Deep => "deep",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ReportLevel::Brief => "Executive Brief",
            ReportLevel::Standard => "Daily Alpha Brief",
            ReportLevel::Deep => "Deep Dive Analysis",
        }
    }

    /// Per-level cap, `[brief, standard, deep]`.
    pub fn pick<T: Copy>(&self, caps: [T; 3]) -> T {
        caps[*self as usize - 1]
    }
}

impl FromStr for ReportLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brief" | "executive" | "1" => Ok(ReportLevel::Brief),
            "standard" | "2" => Ok(ReportLevel::Standard),
            "deep" | "deep_dive" | "3" => Ok(ReportLevel::Deep),
            other => Err(anyhow!("unknown report level: {other}")),
        }
    }
}

/// Feature flags for one report build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub level: ReportLevel,
    pub include_sentiment: bool,
    pub include_technicals: bool,
    pub include_research: bool,
    /// `None` searches every document.
    pub document_ids: Option<Vec<String>>,
    pub title: Option<String>,
    /// `None` disables narrative enhancement.
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    /// Free-text focus instructions appended to enhancement prompts.
    pub custom_prompt: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            level: ReportLevel::Standard,
            include_sentiment: true,
            include_technicals: true,
            include_research: false,
            document_ids: None,
            title: None,
            llm_provider: None,
            llm_model: None,
            custom_prompt: None,
        }
    }
}

impl ReportConfig {
    pub fn brief() -> Self {
        Self {
            level: ReportLevel::Brief,
            include_sentiment: false,
            include_technicals: false,
            ..Self::default()
        }
    }

    pub fn standard() -> Self {
        Self::default()
    }

    pub fn deep() -> Self {
        Self {
            level: ReportLevel::Deep,
            include_technicals: true,
            ..Self::default()
        }
    }

    pub fn for_level(level: ReportLevel) -> Self {
        match level {
            ReportLevel::Brief => Self::brief(),
            ReportLevel::Standard => Self::standard(),
            ReportLevel::Deep => Self::deep(),
        }
    }
}

// ---- Pulse ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeInfo {
    pub regime: MarketRegime,
    pub confidence: f64,
    pub description: String,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentInfo {
    pub overall_score: f64,
    pub bullish_ratio: f64,
    pub trending_tickers: Vec<(String, u32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub description: String,
    pub data_signal: String,
    pub sentiment_signal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseSection {
    pub regime: RegimeInfo,
    pub sentiment: Option<SentimentInfo>,
    pub divergences: Vec<Divergence>,
    pub big_narrative: String,
    pub key_takeaways: Vec<String>,
}

// ---- Sentiment ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubredditBreakdown {
    pub subreddit: String,
    pub sentiment_score: f64,
    pub bullish_ratio: f64,
    pub post_count: u32,
    pub top_tickers: Vec<(String, u32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSection {
    pub overall_score: f64,
    /// "Bullish", "Bearish" or "Neutral".
    pub overall_label: String,
    pub bullish_ratio: f64,
    pub total_posts: u32,
    pub subreddit_count: usize,
    pub trending_tickers: Vec<(String, u32)>,
    pub subreddit_breakdowns: Vec<SubredditBreakdown>,
    pub narrative: String,
    pub contrarian_signals: Vec<String>,
}

// ---- Macro ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorView {
    pub value: Option<f64>,
    pub trend: String,
    pub assessment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionMacro {
    pub region: String,
    pub headline: String,
    pub inflation: Option<IndicatorView>,
    pub growth: Option<IndicatorView>,
    pub policy: Option<IndicatorView>,
    pub risks: Vec<String>,
    pub opportunities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroSection {
    pub us: Option<RegionMacro>,
    pub global_outlook: String,
    pub themes: Vec<String>,
}

// ---- Assets ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityView {
    pub headline: String,
    pub us_indices: BTreeMap<String, Quote>,
    pub global_indices: BTreeMap<String, Quote>,
    pub sectors: BTreeMap<String, f64>,
    pub vix: Option<Quote>,
    pub commentary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedIncomeView {
    pub headline: String,
    pub yield_curve: BTreeMap<String, Option<f64>>,
    pub credit_spreads: BTreeMap<String, f64>,
    /// "inverted", "flat", "normal" or "steep".
    pub curve_shape: String,
    pub commentary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxView {
    pub headline: String,
    pub dxy: Option<Quote>,
    pub dm_pairs: BTreeMap<String, Quote>,
    pub em_pairs: BTreeMap<String, Quote>,
    pub usd_bias: String,
    pub commentary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommodityView {
    pub headline: String,
    pub precious: BTreeMap<String, Quote>,
    pub energy: BTreeMap<String, Quote>,
    pub agriculture: BTreeMap<String, Quote>,
    pub commentary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoView {
    pub headline: String,
    pub major_coins: BTreeMap<String, Quote>,
    pub market_overview: Option<CryptoOverview>,
    pub fear_greed: Option<FearGreed>,
    pub commentary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetSection {
    pub equities: Option<EquityView>,
    pub fixed_income: Option<FixedIncomeView>,
    pub fx: Option<FxView>,
    pub commodities: Option<CommodityView>,
    pub crypto: Option<CryptoView>,
}

// ---- Technicals ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalLevel {
    pub asset: String,
    pub current_price: f64,
    pub pivot: f64,
    pub support_1: f64,
    pub support_2: f64,
    pub resistance_1: f64,
    pub resistance_2: f64,
    /// "bullish", "bearish" or "neutral" relative to the pivot.
    pub trend: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityView {
    pub vix: Option<f64>,
    pub vix_percentile: Option<f64>,
    pub assessment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositioningView {
    pub retail_sentiment: String,
    pub institutional_flows: Option<String>,
}

/// Return correlation of one regime pair over the trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationInsight {
    /// `"SPX/VIX"`.
    pub pair: String,
    pub correlation: f64,
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalsSection {
    pub key_levels: Vec<TechnicalLevel>,
    pub volatility: VolatilityView,
    pub positioning: Option<PositioningView>,
    /// Deep dive only; empty when no history could be fetched.
    #[serde(default)]
    pub correlations: Option<Vec<CorrelationInsight>>,
}

// ---- Forward ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicEvent {
    pub date: String,
    pub event: String,
    pub importance: String,
    pub expected_impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierEvent {
    pub event: String,
    pub probability: String,
    pub potential_impact: String,
    pub hedging_idea: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardSection {
    pub lesson_of_the_day: String,
    pub upcoming_events: Vec<EconomicEvent>,
    pub outlier_event: OutlierEvent,
    pub positioning_suggestions: Option<Vec<String>>,
}

// ---- Research ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchInsight {
    pub text: String,
    pub source: String,
    pub document_id: String,
    pub page: Option<u32>,
    pub relevance_score: f64,
    /// Report section the passage was retrieved for.
    pub section: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchInsightsSection {
    pub insights: Vec<ResearchInsight>,
    pub document_count: usize,
    pub total_chunks_searched: usize,
}

// ---- Report ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositioningRow {
    pub asset_class: String,
    /// "Overweight", "Neutral", "Underweight" (or an FX tilt).
    pub bias: String,
    /// "High", "Medium" or "Low".
    pub conviction: String,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub report_id: String,
    pub title: String,
    pub level: ReportLevel,
    pub created_at: DateTime<Utc>,
    pub config: ReportConfig,

    pub executive_summary: String,
    pub thesis: String,
    pub positioning_summary: Vec<PositioningRow>,

    pub pulse: PulseSection,
    pub sentiment: Option<SentimentSection>,
    #[serde(rename = "macro")]
    pub macro_section: MacroSection,
    pub assets: AssetSection,
    pub technicals: Option<TechnicalsSection>,
    pub forward: ForwardSection,
    pub research: Option<ResearchInsightsSection>,

    pub metadata: BTreeMap<String, serde_json::Value>,
    /// What is missing or degraded: omitted optional sections, failed
    /// snapshot sources, skipped enhancement.
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_and_parse() {
        assert!(ReportLevel::Brief < ReportLevel::Standard);
        assert!(ReportLevel::Standard < ReportLevel::Deep);
        assert_eq!("DEEP".parse::<ReportLevel>().unwrap(), ReportLevel::Deep);
        assert_eq!("executive".parse::<ReportLevel>().unwrap(), ReportLevel::Brief);
        assert!("huge".parse::<ReportLevel>().is_err());
        assert_eq!(ReportLevel::Standard.pick([3, 5, 7]), 5);
    }

    #[test]
    fn presets_toggle_optional_sections() {
        let b = ReportConfig::brief();
        assert!(!b.include_sentiment && !b.include_technicals);
        let d = ReportConfig::deep();
        assert_eq!(d.level, ReportLevel::Deep);
        assert!(d.include_sentiment && d.include_technicals);
        assert_eq!(ReportConfig::for_level(ReportLevel::Standard), ReportConfig::default());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let c: ReportConfig =
            serde_json::from_str(r#"{"level":"deep","llm_provider":"ollama"}"#).unwrap();
        assert_eq!(c.level, ReportLevel::Deep);
        assert_eq!(c.llm_provider, Some(LlmProvider::Ollama));
        assert!(c.include_sentiment);
    }
}
