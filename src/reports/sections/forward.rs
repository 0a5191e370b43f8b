// src/reports/sections/forward.rs
//! Forward watch: event calendar, lesson of the day, tail scenario.
//!
//! Lesson and outlier alternate by the snapshot's day of year, so the same
//! snapshot always yields the same section.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, Duration};

use crate::analyze::MarketRegime;
use crate::reports::models::{EconomicEvent, ForwardSection, OutlierEvent, ReportLevel};
use crate::reports::sections::{SectionBuilder, SectionContext};

struct Outlier {
    event: &'static str,
    probability: &'static str,
    impact: &'static str,
    hedge: &'static str,
}

const fn outlier(
    event: &'static str,
    probability: &'static str,
    impact: &'static str,
    hedge: &'static str,
) -> Outlier {
    Outlier {
        event,
        probability,
        impact,
        hedge,
    }
}

fn outliers(regime: MarketRegime) -> [Outlier; 2] {
    match regime {
        MarketRegime::Goldilocks => [
            outlier(
                "Inflation re-acceleration forcing a hawkish Fed pivot",
                "Low (10-15%)",
                "Sharp repricing of the rate path, equity multiple compression, growth-to-value rotation",
                "Short duration, long energy, reduce growth beta",
            ),
            outlier(
                "Exogenous geopolitical shock breaking the low-vol regime",
                "Low (10%)",
                "VIX spike to 30+, correlation spike across risk assets, safe-haven bid",
                "Long VIX calls, keep a gold allocation, reduce position sizing",
            ),
        ],
        MarketRegime::InflationaryExpansion => [
            outlier(
                "Demand destruction tipping the economy into stagflation",
                "Moderate (15-25%)",
                "Earnings downgrades, credit spread widening, cyclical underperformance",
                "Reduce cyclical exposure, add defensive quality, extend some duration",
            ),
            outlier(
                "Central bank overtightening into a slowdown",
                "Moderate (15-20%)",
                "Rapid growth deceleration, curve steepening, risk-off across equities",
                "Long 2Y treasuries, short financials, long gold",
            ),
        ],
        MarketRegime::Stagflation => [
            outlier(
                "Recession confirmation with persistent inflation",
                "Moderate (20-30%)",
                "Equities down 15-20%, credit blowout, only gold and TIPS hold value",
                "Overweight TIPS, gold and cash; underweight equity and credit",
            ),
            outlier(
                "Coordinated global easing",
                "Low (10%)",
                "Sharp relief rally in risk assets while long-term inflation expectations spike",
                "Keep inflation hedges even while adding risk on the pivot",
            ),
        ],
        MarketRegime::Deflationary => [
            outlier(
                "Credit event in a leveraged sector triggering contagion",
                "Moderate (15-20%)",
                "Credit spread blowout, equity selloff 10-15%, flight to sovereign quality",
                "Long duration treasuries, HY protection, reduce EM exposure",
            ),
            outlier(
                "Fiscal stimulus package shifting growth expectations",
                "Moderate (15-20%)",
                "Curve steepening, value rotation, cyclical outperformance",
                "Barbell: long duration core plus cyclical equity exposure",
            ),
        ],
        MarketRegime::RiskOff => [
            outlier(
                "Systemic credit event at a major bank or sovereign",
                "Low (5-10%)",
                "Correlations spike to one, liquidity withdraws, all risk assets decline",
                "Maximize cash, long treasuries, long VIX, cut credit exposure",
            ),
            outlier(
                "Capitulation selling creates a generational entry point",
                "Moderate (20-30%)",
                "V-shaped recovery once forced selling exhausts, 10%+ bounce in days",
                "Staged buying plan at predetermined levels",
            ),
        ],
        MarketRegime::RiskOn => [
            outlier(
                "Speculative blow-off top and reversal",
                "Moderate (15-25%)",
                "VIX doubles in days and crowded positions unwind violently",
                "Trail stops, buy tail hedges while cheap, reduce position sizing",
            ),
            outlier(
                "Fundamental deterioration masked by momentum",
                "Moderate (15-20%)",
                "Earnings miss cycle begins and multiple compression accelerates",
                "Rotate toward quality and profitability, trim pure momentum",
            ),
        ],
    }
}

fn lessons(regime: MarketRegime) -> [&'static str; 2] {
    match regime {
        MarketRegime::Goldilocks => [
            "Goldilocks regimes reward staying invested but punish complacency. Use low-vol stretches to buy cheap protection.",
            "When everything works, the temptation is to add leverage. Peak positioning confidence tends to precede the sharpest drawdowns.",
        ],
        MarketRegime::InflationaryExpansion => [
            "Inflation regimes flatter nominal returns while eroding real ones. Favor pricing power and real-asset backing.",
            "In an inflationary expansion the Fed is the adversary: every strong print brings tighter policy closer.",
        ],
        MarketRegime::Stagflation => [
            "Stagflation breaks the 60/40 portfolio because bonds and equities suffer together. Real assets and cash are the shelters.",
            "In stagflation, capital preservation outweighs capital appreciation. The winner is whoever loses least.",
        ],
        MarketRegime::Deflationary => [
            "Deflationary regimes reward patience and quality. Size positions for the drawdown, not the destination.",
            "When deflation threatens, the policy response becomes the dominant variable. Position for the reaction.",
        ],
        MarketRegime::RiskOff => [
            "Risk-off regimes test conviction. Forced selling creates opportunity, but only with staged entry and strict limits.",
            "In a liquidation, correlations go to one and diversification fails. The only true hedge is cash or explicit optionality.",
        ],
        MarketRegime::RiskOn => [
            "Risk-on regimes feel easy, which is the danger. Insurance is cheapest exactly now.",
            "Momentum works until it doesn't. The turn from risk-on to risk-off happens in days, not weeks.",
        ],
    }
}

const EVENTS: [(&str, &str); 10] = [
    ("FOMC Rate Decision", "high"),
    ("US CPI Release", "high"),
    ("US NFP Employment", "high"),
    ("ECB Rate Decision", "high"),
    ("US Retail Sales", "medium"),
    ("US PMI Flash (Mfg/Svc)", "medium"),
    ("BoJ Rate Decision", "medium"),
    ("US Jobless Claims", "medium"),
    ("US PCE Price Index", "high"),
    ("China PMI", "medium"),
];

fn event_impact(event: &str, regime: MarketRegime) -> String {
    use MarketRegime::*;
    let specific = match (event, regime) {
        ("FOMC Rate Decision", Goldilocks) => Some("Fed likely on hold; a dovish tilt extends the rally, a hawkish surprise caps upside"),
        ("FOMC Rate Decision", InflationaryExpansion) => Some("Hawkish hold expected; any hint of further hikes pressures duration"),
        ("FOMC Rate Decision", Stagflation) => Some("Policy dilemma: a cut stokes inflation, a hold risks recession"),
        ("FOMC Rate Decision", Deflationary) => Some("Easing cycle likely; the pace of cuts drives risk assets"),
        ("FOMC Rate Decision", RiskOff) => Some("Watch for emergency action signalling systemic concern"),
        ("FOMC Rate Decision", RiskOn) => Some("Staying accommodative fuels the rally; pushback on financial conditions risks repricing"),
        ("US CPI Release", Goldilocks) => Some("Confirmation of disinflation extends goldilocks; an upside surprise threatens the regime"),
        ("US CPI Release", InflationaryExpansion) => Some("Upside surprise reinforces tightening; downside opens the door to a pivot"),
        ("US CPI Release", Stagflation) => Some("Sticky inflation with weak growth is the nightmare case; any softening brings relief"),
        ("US CPI Release", Deflationary) => Some("Further deceleration confirms the trend; a rebound could signal a false alarm"),
        ("US CPI Release", RiskOff) => Some("A hot print intensifies selling; a soft print is a recovery catalyst"),
        ("US CPI Release", RiskOn) => Some("In-line print keeps the status quo; an upside surprise tests conviction"),
        _ => None,
    };
    match specific {
        Some(s) => s.to_string(),
        None => format!(
            "Key data release; monitor for {} regime confirmation or shift",
            regime.label()
        ),
    }
}

fn suggestions(regime: MarketRegime) -> Vec<String> {
    let s: [&str; 4] = match regime {
        MarketRegime::Goldilocks => [
            "Maintain equity overweight, trimming on strength",
            "Keep duration moderate",
            "Use low volatility to buy tail hedges 3-6 months out",
            "Favor quality growth over deep value",
        ],
        MarketRegime::InflationaryExpansion => [
            "Overweight commodities and energy",
            "Keep duration short while real yields rise",
            "Favor value over growth",
            "Add TIPS exposure",
        ],
        MarketRegime::Stagflation => [
            "Raise cash to 15-25% for optionality",
            "Overweight gold and TIPS",
            "Underweight equities, especially cyclicals",
            "Avoid credit risk",
        ],
        MarketRegime::Deflationary => [
            "Extend duration in long-end treasuries",
            "Overweight quality balance sheets",
            "Reduce commodity exposure",
            "Prepare a playbook for the policy response",
        ],
        MarketRegime::RiskOff => [
            "Prioritize capital preservation: raise cash, cut leverage",
            "Hold core treasuries as ballast",
            "Build a staged re-entry plan",
            "Wait for volatility to normalize before rebuilding risk",
        ],
        MarketRegime::RiskOn => [
            "Participate in momentum with trailing stops",
            "Buy tail protection while it is cheap",
            "Favor higher beta: small caps and EM",
            "Monitor positioning data for crowding",
        ],
    };
    s.iter().map(|x| x.to_string()).collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardBuilder;

#[async_trait]
impl SectionBuilder for ForwardBuilder {
    type Output = ForwardSection;

    fn name(&self) -> &'static str {
        "forward"
    }

    async fn build(&self, ctx: &SectionContext) -> Result<ForwardSection> {
        let regime = ctx.regime.regime;
        let as_of = ctx.snapshot.timestamp;
        let pick = (as_of.ordinal() % 2) as usize;

        let limit = ctx.level.pick([3, 5, 8]);
        let upcoming_events = EVENTS
            .iter()
            .filter(|(_, importance)| ctx.level > ReportLevel::Brief || *importance == "high")
            .take(limit)
            .enumerate()
            .map(|(i, (event, importance))| EconomicEvent {
                date: (as_of + Duration::days(i as i64 + 1)).format("%Y-%m-%d").to_string(),
                event: event.to_string(),
                importance: importance.to_string(),
                expected_impact: event_impact(event, regime),
            })
            .collect();

        let o = &outliers(regime)[pick];
        Ok(ForwardSection {
            lesson_of_the_day: lessons(regime)[pick].to_string(),
            upcoming_events,
            outlier_event: OutlierEvent {
                event: o.event.to_string(),
                probability: o.probability.to_string(),
                potential_impact: o.impact.to_string(),
                hedging_idea: (ctx.level >= ReportLevel::Standard).then(|| o.hedge.to_string()),
            },
            positioning_suggestions: (ctx.level == ReportLevel::Deep).then(|| suggestions(regime)),
        })
    }
}
