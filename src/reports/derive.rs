// src/reports/derive.rs
//! Cross-section fields computed once every section is final: title,
//! executive summary, thesis and the positioning table.

use chrono::{DateTime, Utc};

use crate::analyze::{MarketRegime, RegimeAssessment, RegimeImplications};
use crate::reports::models::{
    AssetSection, MacroSection, PositioningRow, PulseSection, ReportLevel, SentimentSection,
};
use crate::reports::sections::macro_outlook::inflation_trend;
use crate::reports::sections::sentiment::score_label;

pub fn title(level: ReportLevel, regime: MarketRegime, at: DateTime<Utc>) -> String {
    format!(
        "{}: {} - {}",
        level.display_name(),
        regime.title(),
        at.format("%B %d, %Y")
    )
}

fn conviction(confidence: f64) -> &'static str {
    if confidence > 0.6 {
        "High"
    } else if confidence > 0.4 {
        "Medium"
    } else {
        "Low"
    }
}

/// The single most telling price move, SPX first, then BTC.
pub fn top_asset_move(assets: &AssetSection) -> Option<String> {
    let spx = assets
        .equities
        .as_ref()
        .and_then(|e| e.us_indices.get("spx"))
        .map(|q| ("SPX", q));
    let btc = assets
        .crypto
        .as_ref()
        .and_then(|c| c.major_coins.get("bitcoin"))
        .map(|q| ("BTC", q));
    let (name, q) = spx.or(btc)?;
    Some(match q.change_percent {
        Some(chg) => format!("{name} at {:.0} ({chg:+.2}% on the day).", q.price),
        None => format!("{name} at {:.0}.", q.price),
    })
}

fn first_sentence(text: &str) -> &str {
    match text.find(". ") {
        Some(i) => &text[..=i],
        None => text,
    }
}

pub fn executive_summary(
    regime: &RegimeAssessment,
    pulse: &PulseSection,
    macro_section: &MacroSection,
    assets: &AssetSection,
    sentiment: Option<&SentimentSection>,
) -> String {
    let strength = match conviction(regime.confidence) {
        "High" => "high conviction",
        "Medium" => "moderate conviction",
        _ => "mixed signals",
    };
    let mut parts = vec![format!(
        "Markets are in a {} regime with {strength} ({:.0}% confidence).",
        regime.regime.title(),
        regime.confidence * 100.0
    )];
    if let Some(m) = top_asset_move(assets) {
        parts.push(m);
    }
    if let Some(us) = &macro_section.us {
        let s = first_sentence(&us.headline).trim_end_matches('.');
        parts.push(format!("US macro: {s}."));
    }
    if let Some(d) = pulse.divergences.first() {
        parts.push(format!("Watch: {}.", d.description.trim_end_matches('.')));
    } else if let Some(s) = sentiment {
        parts.push(format!(
            "Retail sentiment reads {} ({:+.2}).",
            score_label(s.overall_score).to_ascii_lowercase(),
            s.overall_score
        ));
    }
    parts.join(" ")
}

pub fn thesis(regime: &RegimeAssessment, imp: &RegimeImplications) -> String {
    let r = regime.regime;
    let mut core = format!("The {} regime favors a {} stance on equities", r.label(), imp.equity_bias.as_str());
    if !imp.sectors.is_empty() {
        core.push_str(&format!(" with leadership in {}", imp.sectors.join(", ")));
    }
    if let Some(d) = imp.duration {
        core.push_str(&format!(" and {d} duration in fixed income"));
    }
    core.push('.');
    let mut parts = vec![core];

    let trend = inflation_trend(&regime.indicators);
    match (r, trend) {
        (MarketRegime::Goldilocks | MarketRegime::RiskOn, "rising") => {
            parts.push("Re-accelerating headline inflation is the main threat to this backdrop.".to_string())
        }
        (MarketRegime::InflationaryExpansion | MarketRegime::Stagflation, "falling") => {
            parts.push("Cooling headline inflation would argue for a regime transition.".to_string())
        }
        _ => {}
    }

    match (r, regime.indicators.vix) {
        (MarketRegime::Goldilocks, Some(v)) if v > 20.0 => parts.push(format!(
            "A VIX of {v:.1} sits uneasily with the goldilocks read; size positions conservatively."
        )),
        (MarketRegime::RiskOff, Some(v)) if v < 20.0 => parts.push(format!(
            "A VIX of {v:.1} suggests the stress may be fading."
        )),
        _ => {}
    }

    parts.push(format!(
        "Conviction is {}.",
        conviction(regime.confidence).to_ascii_lowercase()
    ));
    parts.join(" ")
}

pub fn positioning_summary(regime: &RegimeAssessment, imp: &RegimeImplications) -> Vec<PositioningRow> {
    let label = regime.regime.label();
    let conv = conviction(regime.confidence);
    let row = |asset_class: &str, bias: &str, conviction: &str, rationale: String| PositioningRow {
        asset_class: asset_class.to_string(),
        bias: bias.to_string(),
        conviction: conviction.to_string(),
        rationale,
    };

    let sectors = if imp.sectors.is_empty() {
        String::new()
    } else {
        format!("; favor {}", imp.sectors.join(", "))
    };
    let commodities = if imp.commodity_focus.is_empty() {
        "Broad commodity exposure".to_string()
    } else {
        format!("Focus on {}", imp.commodity_focus.join(", "))
    };

    vec![
        row(
            "Equities",
            imp.equity_bias.weight_label(),
            conv,
            format!("{} equity bias in a {label} regime{sectors}", imp.equity_bias.as_str()),
        ),
        row(
            "Fixed Income",
            imp.fixed_income_bias.weight_label(),
            conv,
            format!("Duration: {}", imp.duration.unwrap_or("neutral")),
        ),
        row("Commodities", imp.commodity_bias.weight_label(), "Medium", commodities),
        row(
            "Crypto",
            imp.crypto_bias.weight_label(),
            "Low",
            "High-beta risk asset; size accordingly".to_string(),
        ),
        row(
            "FX",
            imp.fx_bias.weight_label(),
            conv,
            format!("USD positioning follows the {label} regime"),
        ),
    ]
}

/// One line per section, fed to the executive-summary prompt.
pub fn headlines(pulse: &PulseSection, macro_section: &MacroSection, assets: &AssetSection) -> Vec<String> {
    let mut out = vec![first_sentence(&pulse.big_narrative).to_string()];
    if let Some(us) = &macro_section.us {
        out.push(us.headline.clone());
    }
    if let Some(e) = &assets.equities {
        out.push(e.headline.clone());
    }
    if let Some(f) = &assets.fixed_income {
        out.push(f.headline.clone());
    }
    out
}
