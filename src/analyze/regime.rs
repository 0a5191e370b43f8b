// src/analyze/regime.rs
//! Rule-based market regime scoring over a [`Snapshot`].
//!
//! Each indicator band adds weight to one or more regimes; the best-scoring
//! regime wins (ties go to the earlier variant) and confidence is its share
//! of the total weight, 0.5 when nothing scored.

use serde::{Deserialize, Serialize};

use crate::ingest::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    Goldilocks,
    InflationaryExpansion,
    Stagflation,
    Deflationary,
    RiskOff,
    RiskOn,
}

impl MarketRegime {
    pub const ALL: [MarketRegime; 6] = [
        MarketRegime::Goldilocks,
        MarketRegime::InflationaryExpansion,
        MarketRegime::Stagflation,
        MarketRegime::Deflationary,
        MarketRegime::RiskOff,
        MarketRegime::RiskOn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketRegime::Goldilocks => "goldilocks",
            MarketRegime::InflationaryExpansion => "inflationary_expansion",
            MarketRegime::Stagflation => "stagflation",
            MarketRegime::Deflationary => "deflationary",
            MarketRegime::RiskOff => "risk_off",
            MarketRegime::RiskOn => "risk_on",
        }
    }

    /// Lowercase words, e.g. `"risk off"`.
    pub fn label(&self) -> String {
        self.as_str().replace('_', " ")
    }

    /// Title case, e.g. `"Inflationary Expansion"`.
    pub fn title(&self) -> String {
        self.as_str()
            .split('_')
            .map(|w| {
                let mut c = w.chars();
                match c.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + c.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn description(&self) -> &'static str {
        match self {
            MarketRegime::Goldilocks => {
                "Markets are in a Goldilocks environment with moderate growth, contained inflation and supportive financial conditions. Risk assets typically perform well in this regime."
            }
            MarketRegime::InflationaryExpansion => {
                "The economy is in an inflationary expansion: strong growth with rising prices. Central banks may tighten policy. Commodities and value stocks tend to outperform."
            }
            MarketRegime::Stagflation => {
                "Stagflationary conditions are emerging with weak growth and elevated inflation. This environment typically favors defensive positioning and real assets."
            }
            MarketRegime::Deflationary => {
                "Deflationary pressures are building with weak growth and falling prices. Central banks may ease policy. Duration and quality typically outperform."
            }
            MarketRegime::RiskOff => {
                "Markets are in risk-off mode with elevated volatility and widening credit spreads. Investors are seeking safe havens."
            }
            MarketRegime::RiskOn => {
                "Risk appetite is elevated with low volatility and tight spreads. Higher beta and credit assets tend to outperform."
            }
        }
    }
}

impl std::fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs read out of a snapshot; anything missing stays `None` and simply
/// does not score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegimeIndicators {
    pub cpi_yoy: Option<f64>,
    pub core_pce_yoy: Option<f64>,
    pub gdp_growth: Option<f64>,
    pub unemployment: Option<f64>,
    pub fed_funds: Option<f64>,
    pub yield_curve_2s10s: Option<f64>,
    pub vix: Option<f64>,
    pub credit_spread_hy: Option<f64>,
    pub spx_change_pct: Option<f64>,
}

impl RegimeIndicators {
    pub fn from_snapshot(snap: &Snapshot) -> Self {
        let mut ind = Self::default();
        if let Some(m) = &snap.macro_data {
            ind.cpi_yoy = m.inflation.get("cpi").and_then(|p| p.pct_change);
            ind.core_pce_yoy = m.inflation.get("core_pce").and_then(|p| p.pct_change);
            ind.gdp_growth = m.growth.get("gdp_growth").map(|p| p.value);
            ind.unemployment = m.labor.get("unemployment").map(|p| p.value);
        }
        if let Some(fi) = &snap.fixed_income {
            ind.fed_funds = fi.rates.get("fed_funds").map(|p| p.value);
            ind.yield_curve_2s10s = fi.yield_curve.get("spread_2s10s").copied().flatten();
            ind.credit_spread_hy = fi.credit.get("hy_spread").map(|p| p.value);
        }
        if let Some(eq) = &snap.equities {
            ind.vix = eq.vix.as_ref().map(|q| q.price);
            ind.spx_change_pct = eq.us.get("spx").and_then(|q| q.change_percent);
        }
        ind
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeAssessment {
    pub regime: MarketRegime,
    /// 0.0 ..= 1.0
    pub confidence: f64,
    pub description: String,
    pub signals: Vec<String>,
    pub indicators: RegimeIndicators,
}

/// Analysis collaborator consumed by the report sections.
pub trait RegimeClassifier: Send + Sync {
    fn classify(&self, snapshot: &Snapshot) -> RegimeAssessment;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleRegimeClassifier;

impl RuleRegimeClassifier {
    pub const INFLATION_HIGH: f64 = 3.0;
    pub const INFLATION_LOW: f64 = 1.5;
    pub const GROWTH_HIGH: f64 = 2.5;
    pub const GROWTH_LOW: f64 = 1.0;
    pub const VIX_LOW: f64 = 15.0;
    pub const VIX_HIGH: f64 = 25.0;
    pub const VIX_EXTREME: f64 = 35.0;
    pub const CURVE_STEEP: f64 = 1.5;
    pub const CREDIT_TIGHT: f64 = 3.0;
    pub const CREDIT_WIDE: f64 = 5.0;

    pub fn classify_indicators(&self, ind: RegimeIndicators) -> RegimeAssessment {
        use MarketRegime::*;

        let mut scores = [0.0_f64; 6];
        let mut add = |r: MarketRegime, w: f64| scores[r as usize] += w;
        let mut signals = Vec::new();

        if let Some(infl) = ind.cpi_yoy.or(ind.core_pce_yoy) {
            if infl > Self::INFLATION_HIGH {
                signals.push(format!("High inflation ({infl:.1}%)"));
                add(InflationaryExpansion, 0.3);
                add(Stagflation, 0.3);
            } else if infl < Self::INFLATION_LOW {
                signals.push(format!("Low inflation ({infl:.1}%)"));
                add(Deflationary, 0.3);
                add(Goldilocks, 0.2);
            } else {
                signals.push(format!("Moderate inflation ({infl:.1}%)"));
                add(Goldilocks, 0.3);
            }
        }

        if let Some(g) = ind.gdp_growth {
            if g > Self::GROWTH_HIGH {
                signals.push(format!("Strong growth ({g:.1}%)"));
                add(InflationaryExpansion, 0.3);
                add(Goldilocks, 0.2);
            } else if g < Self::GROWTH_LOW {
                signals.push(format!("Weak growth ({g:.1}%)"));
                add(Stagflation, 0.3);
                add(Deflationary, 0.3);
            } else {
                signals.push(format!("Moderate growth ({g:.1}%)"));
                add(Goldilocks, 0.3);
            }
        }

        if let Some(v) = ind.vix {
            if v > Self::VIX_EXTREME {
                signals.push(format!("Extreme volatility (VIX: {v:.1})"));
                add(RiskOff, 0.4);
            } else if v > Self::VIX_HIGH {
                signals.push(format!("Elevated volatility (VIX: {v:.1})"));
                add(RiskOff, 0.2);
            } else if v < Self::VIX_LOW {
                signals.push(format!("Low volatility (VIX: {v:.1})"));
                add(RiskOn, 0.3);
                add(Goldilocks, 0.2);
            }
        }

        if let Some(c) = ind.yield_curve_2s10s {
            if c < 0.0 {
                signals.push(format!("Inverted yield curve ({c:.2}%)"));
                add(Stagflation, 0.2);
                add(Deflationary, 0.2);
            } else if c > Self::CURVE_STEEP {
                signals.push(format!("Steep yield curve ({c:.2}%)"));
                add(InflationaryExpansion, 0.2);
            }
        }

        if let Some(s) = ind.credit_spread_hy {
            if s > Self::CREDIT_WIDE {
                signals.push(format!("Wide credit spreads ({s:.2}%)"));
                add(RiskOff, 0.3);
            } else if s < Self::CREDIT_TIGHT {
                signals.push(format!("Tight credit spreads ({s:.2}%)"));
                add(RiskOn, 0.3);
            }
        }

        let mut best = Goldilocks;
        for r in MarketRegime::ALL {
            if scores[r as usize] > scores[best as usize] {
                best = r;
            }
        }
        let total: f64 = scores.iter().sum();
        let confidence = if total > 0.0 {
            scores[best as usize] / total
        } else {
            0.5
        };

        RegimeAssessment {
            regime: best,
            confidence,
            description: best.description().to_string(),
            signals,
            indicators: ind,
        }
    }
}

impl RegimeClassifier for RuleRegimeClassifier {
    fn classify(&self, snapshot: &Snapshot) -> RegimeAssessment {
        self.classify_indicators(RegimeIndicators::from_snapshot(snapshot))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    Bullish,
    Bearish,
    Cautious,
    Neutral,
    Mixed,
}

impl Bias {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bias::Bullish => "bullish",
            Bias::Bearish => "bearish",
            Bias::Cautious => "cautious",
            Bias::Neutral => "neutral",
            Bias::Mixed => "mixed",
        }
    }

    /// Positioning label used in summary tables.
    pub fn weight_label(&self) -> &'static str {
        match self {
            Bias::Bullish => "Overweight",
            Bias::Bearish | Bias::Cautious => "Underweight",
            Bias::Neutral | Bias::Mixed => "Neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FxBias {
    UsdBullish,
    SafeHaven,
    RiskCurrencies,
    Neutral,
}

impl FxBias {
    pub fn weight_label(&self) -> &'static str {
        match self {
            FxBias::UsdBullish => "Overweight USD",
            FxBias::SafeHaven => "Overweight USD/JPY/CHF",
            FxBias::RiskCurrencies => "Overweight AUD/NZD/EM",
            FxBias::Neutral => "Neutral",
        }
    }
}

/// Asset-class tilts associated with a regime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeImplications {
    pub equity_bias: Bias,
    pub sectors: &'static [&'static str],
    pub fixed_income_bias: Bias,
    pub duration: Option<&'static str>,
    pub fx_bias: FxBias,
    pub commodity_bias: Bias,
    pub commodity_focus: &'static [&'static str],
    pub crypto_bias: Bias,
}

pub fn implications(regime: MarketRegime) -> RegimeImplications {
    use Bias::*;
    match regime {
        MarketRegime::Goldilocks => RegimeImplications {
            equity_bias: Bullish,
            sectors: &["tech", "growth"],
            fixed_income_bias: Neutral,
            duration: Some("moderate"),
            fx_bias: FxBias::Neutral,
            commodity_bias: Neutral,
            commodity_focus: &[],
            crypto_bias: Bullish,
        },
        MarketRegime::InflationaryExpansion => RegimeImplications {
            equity_bias: Cautious,
            sectors: &["energy", "materials", "financials"],
            fixed_income_bias: Bearish,
            duration: Some("short"),
            fx_bias: FxBias::UsdBullish,
            commodity_bias: Bullish,
            commodity_focus: &[],
            crypto_bias: Mixed,
        },
        MarketRegime::Stagflation => RegimeImplications {
            equity_bias: Bearish,
            sectors: &["staples", "utilities", "healthcare"],
            fixed_income_bias: Cautious,
            duration: None,
            fx_bias: FxBias::SafeHaven,
            commodity_bias: Bullish,
            commodity_focus: &["gold"],
            crypto_bias: Bearish,
        },
        MarketRegime::Deflationary => RegimeImplications {
            equity_bias: Bearish,
            sectors: &["tech", "staples"],
            fixed_income_bias: Bullish,
            duration: Some("long"),
            fx_bias: FxBias::UsdBullish,
            commodity_bias: Bearish,
            commodity_focus: &[],
            crypto_bias: Mixed,
        },
        MarketRegime::RiskOff => RegimeImplications {
            equity_bias: Bearish,
            sectors: &["staples", "utilities"],
            fixed_income_bias: Bullish,
            duration: None,
            fx_bias: FxBias::SafeHaven,
            commodity_bias: Mixed,
            commodity_focus: &["gold"],
            crypto_bias: Bearish,
        },
        MarketRegime::RiskOn => RegimeImplications {
            equity_bias: Bullish,
            sectors: &["tech", "discretionary"],
            fixed_income_bias: Neutral,
            duration: None,
            fx_bias: FxBias::RiskCurrencies,
            commodity_bias: Neutral,
            commodity_focus: &[],
            crypto_bias: Bullish,
        },
    }
}
