// src/reports/sections/macro_outlook.rs
//! US macro read-out plus global outlook and themes.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::analyze::{MarketRegime, RegimeIndicators, RuleRegimeClassifier as Rules};
use crate::reports::models::{IndicatorView, MacroSection, RegionMacro, ReportLevel};
use crate::reports::sections::{SectionBuilder, SectionContext};

const HEADLINE_MAX: usize = 150;

#[derive(Debug, Clone, Copy, Default)]
pub struct MacroBuilder;

#[async_trait]
impl SectionBuilder for MacroBuilder {
    type Output = MacroSection;

    fn name(&self) -> &'static str {
        "macro"
    }

    async fn build(&self, ctx: &SectionContext) -> Result<MacroSection> {
        if ctx.snapshot.macro_data.is_none() {
            return Err(anyhow!("macro data unavailable"));
        }
        let ind = &ctx.regime.indicators;
        let detailed = ctx.level >= ReportLevel::Standard;
        let cap = ctx.level.pick([2, 3, 5]);

        let mut risks = risks(ind);
        risks.truncate(cap);
        let mut opportunities = opportunities(ind, ctx.regime.regime);
        opportunities.truncate(cap);

        let us = RegionMacro {
            region: "US".to_string(),
            headline: headline(ind),
            inflation: detailed.then(|| inflation_view(ind)).flatten(),
            growth: detailed.then(|| growth_view(ind)).flatten(),
            policy: detailed.then(|| policy_view(ind)).flatten(),
            risks,
            opportunities,
        };

        let mut themes = themes(ind, ctx.regime.regime);
        themes.truncate(ctx.level.pick([3, 5, 5]));

        Ok(MacroSection {
            us: Some(us),
            global_outlook: global_outlook(ind, ctx.regime.regime),
            themes,
        })
    }
}

/// `rising` / `falling` / `stable` from headline vs core inflation.
pub fn inflation_trend(ind: &RegimeIndicators) -> &'static str {
    match (ind.cpi_yoy, ind.core_pce_yoy) {
        (Some(cpi), Some(core)) if cpi - core > 0.1 => "rising",
        (Some(cpi), Some(core)) if core - cpi > 0.1 => "falling",
        (Some(_), Some(_)) => "stable",
        _ => "unknown",
    }
}

fn inflation_view(ind: &RegimeIndicators) -> Option<IndicatorView> {
    let value = ind.cpi_yoy.or(ind.core_pce_yoy)?;
    let assessment = if value > Rules::INFLATION_HIGH {
        "Above target; restrictive policy likely to persist"
    } else if value < Rules::INFLATION_LOW {
        "Below target; room for policy easing"
    } else {
        "Near target; policy flexibility intact"
    };
    Some(IndicatorView {
        value: Some(value),
        trend: inflation_trend(ind).to_string(),
        assessment: assessment.to_string(),
    })
}

fn growth_view(ind: &RegimeIndicators) -> Option<IndicatorView> {
    let g = ind.gdp_growth?;
    let (trend, assessment) = if g > Rules::GROWTH_HIGH {
        ("expanding", "Above-trend growth supports earnings")
    } else if g < Rules::GROWTH_LOW {
        ("slowing", "Sub-trend growth raises recession risk")
    } else {
        ("moderate", "Growth running near trend")
    };
    let assessment = match ind.unemployment {
        Some(u) => format!("{assessment}; unemployment at {u:.1}%"),
        None => assessment.to_string(),
    };
    Some(IndicatorView {
        value: Some(g),
        trend: trend.to_string(),
        assessment,
    })
}

fn policy_view(ind: &RegimeIndicators) -> Option<IndicatorView> {
    let ff = ind.fed_funds?;
    let (trend, assessment) = match ind.cpi_yoy {
        Some(cpi) if ff - cpi > 1.0 => ("restrictive", format!("Real policy rate {:+.1}% is restrictive", ff - cpi)),
        Some(cpi) if ff - cpi < 0.0 => ("accommodative", format!("Real policy rate {:+.1}% is accommodative", ff - cpi)),
        Some(cpi) => ("neutral", format!("Real policy rate {:+.1}% is near neutral", ff - cpi)),
        None => ("unknown", format!("Fed funds at {ff:.2}%")),
    };
    Some(IndicatorView {
        value: Some(ff),
        trend: trend.to_string(),
        assessment,
    })
}

fn headline(ind: &RegimeIndicators) -> String {
    let mut parts = Vec::new();
    if let Some(cpi) = ind.cpi_yoy {
        parts.push(format!("CPI running at {cpi:.1}% ({})", inflation_trend(ind)));
    }
    if let Some(g) = ind.gdp_growth {
        parts.push(format!("GDP growth {g:.1}%"));
    }
    if let Some(ff) = ind.fed_funds {
        parts.push(format!("fed funds at {ff:.2}%"));
    }
    let text = if parts.is_empty() {
        "US macro data is partial today".to_string()
    } else {
        parts.join(", ")
    };
    if text.chars().count() > HEADLINE_MAX {
        format!("{}...", text.chars().take(HEADLINE_MAX).collect::<String>())
    } else {
        text
    }
}

fn risks(ind: &RegimeIndicators) -> Vec<String> {
    let mut out = Vec::new();
    if ind.cpi_yoy.is_some_and(|c| c > Rules::INFLATION_HIGH) {
        out.push("Sticky inflation keeps policy restrictive for longer".to_string());
    }
    if ind.yield_curve_2s10s.is_some_and(|c| c < 0.0) {
        out.push("Inverted curve flags elevated recession probability".to_string());
    }
    if ind.gdp_growth.is_some_and(|g| g < Rules::GROWTH_LOW) {
        out.push("Growth slowdown feeding into earnings downgrades".to_string());
    }
    if ind.credit_spread_hy.is_some_and(|s| s > Rules::CREDIT_WIDE) {
        out.push("Credit stress spreading from high yield".to_string());
    }
    if ind.unemployment.is_some_and(|u| u > 4.5) {
        out.push("Labor market softening".to_string());
    }
    if inflation_trend(ind) == "rising" {
        out.push("Headline inflation re-accelerating relative to core".to_string());
    }
    out
}

fn opportunities(ind: &RegimeIndicators, regime: MarketRegime) -> Vec<String> {
    let mut out = Vec::new();
    if inflation_trend(ind) == "falling" {
        out.push("Disinflation opens the door to rate cuts".to_string());
    }
    if ind.gdp_growth.is_some_and(|g| g >= Rules::GROWTH_LOW) {
        out.push("Resilient growth supports cyclical earnings".to_string());
    }
    if ind.yield_curve_2s10s.is_some_and(|c| c > Rules::CURVE_STEEP) {
        out.push("Steep curve rewards carry and bank margins".to_string());
    }
    match regime {
        MarketRegime::Deflationary | MarketRegime::RiskOff => {
            out.push("Long-duration quality bonds as ballast".to_string())
        }
        MarketRegime::Goldilocks | MarketRegime::RiskOn => {
            out.push("Quality growth equities in a supportive backdrop".to_string())
        }
        MarketRegime::InflationaryExpansion | MarketRegime::Stagflation => {
            out.push("Real assets and pricing-power franchises".to_string())
        }
    }
    out
}

fn global_outlook(ind: &RegimeIndicators, regime: MarketRegime) -> String {
    let mut text = format!("The global backdrop reads as {}.", regime.label());
    match ind.yield_curve_2s10s {
        Some(c) if c < 0.0 => text.push_str(" The inverted US curve keeps recession risk on the table."),
        Some(c) if c > Rules::CURVE_STEEP => text.push_str(" A steep US curve points to reflationary expectations."),
        _ => {}
    }
    if let Some(v) = ind.vix {
        if v > Rules::VIX_HIGH {
            text.push_str(" Elevated volatility argues for smaller position sizes.");
        }
    }
    text
}

fn themes(ind: &RegimeIndicators, regime: MarketRegime) -> Vec<String> {
    let mut out = vec![format!("{} regime shaping cross-asset leadership", regime.title())];
    match inflation_trend(ind) {
        "rising" => out.push("Inflation persistence versus policy patience".to_string()),
        "falling" => out.push("Disinflation and the timing of policy easing".to_string()),
        _ => out.push("Central bank data dependence".to_string()),
    }
    if let Some(c) = ind.yield_curve_2s10s {
        out.push(if c < 0.0 {
            "Curve inversion and late-cycle positioning".to_string()
        } else {
            "Curve normalization and term premium".to_string()
        });
    }
    if ind.credit_spread_hy.is_some() {
        out.push("Credit spreads as the risk-appetite barometer".to_string());
    }
    out.push("Dollar direction and global liquidity".to_string());
    out.push("Geopolitics and energy supply".to_string());
    out
}
