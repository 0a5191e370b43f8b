// src/reports/sections/assets.rs
//! Per-asset-class views with regime-aware commentary.
//!
//! What counts as a notable move depends on the regime: a 0.5% equity move is
//! news in goldilocks and noise in risk-off. The section fails only when all
//! five asset categories are missing from the snapshot.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::analyze::{Bias, FxBias, MarketRegime, RegimeImplications};
use crate::ingest::types::{CommodityData, CryptoData, EquityData, FixedIncomeData, FxData, Quote};
use crate::reports::models::{
    AssetSection, CommodityView, CryptoView, EquityView, FixedIncomeView, FxView, ReportLevel,
};
use crate::reports::sections::{sentences, title_words, SectionBuilder, SectionContext};

/// Move thresholds (percent, VIX points) for one regime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveThresholds {
    pub equity: f64,
    pub vix_high: f64,
    pub vix_low: f64,
    pub fx: f64,
    pub gold: f64,
    pub oil: f64,
    pub btc: f64,
}

pub fn thresholds(regime: MarketRegime) -> MoveThresholds {
    let t = |equity, vix_high, vix_low, fx, gold, oil, btc| MoveThresholds {
        equity,
        vix_high,
        vix_low,
        fx,
        gold,
        oil,
        btc,
    };
    match regime {
        MarketRegime::Goldilocks => t(0.5, 20.0, 13.0, 0.2, 0.3, 0.7, 2.0),
        MarketRegime::InflationaryExpansion => t(0.7, 22.0, 15.0, 0.3, 0.5, 1.0, 3.0),
        MarketRegime::Stagflation => t(0.5, 25.0, 18.0, 0.3, 0.4, 1.0, 3.0),
        MarketRegime::Deflationary => t(0.5, 22.0, 15.0, 0.2, 0.3, 0.7, 2.0),
        MarketRegime::RiskOff => t(1.0, 30.0, 20.0, 0.4, 0.5, 1.5, 4.0),
        MarketRegime::RiskOn => t(0.5, 18.0, 12.0, 0.2, 0.3, 0.7, 2.0),
    }
}

fn sector_leaders(regime: MarketRegime) -> &'static [&'static str] {
    match regime {
        MarketRegime::Goldilocks => &["technology", "consumer_discretionary", "communication_services"],
        MarketRegime::InflationaryExpansion => &["energy", "materials", "financials"],
        MarketRegime::Stagflation | MarketRegime::RiskOff => &["consumer_staples", "utilities", "healthcare"],
        MarketRegime::Deflationary => &["technology", "consumer_staples", "utilities"],
        MarketRegime::RiskOn => &["technology", "consumer_discretionary", "financials"],
    }
}

fn sector_list(xs: &[&str]) -> String {
    xs.iter().map(|s| title_words(s)).collect::<Vec<_>>().join(", ")
}

fn change(q: &Quote) -> f64 {
    q.change_percent.unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AssetsBuilder;

#[async_trait]
impl SectionBuilder for AssetsBuilder {
    type Output = AssetSection;

    fn name(&self) -> &'static str {
        "assets"
    }

    async fn build(&self, ctx: &SectionContext) -> Result<AssetSection> {
        let snap = &ctx.snapshot;
        if snap.equities.is_none()
            && snap.fixed_income.is_none()
            && snap.fx.is_none()
            && snap.commodities.is_none()
            && snap.crypto.is_none()
        {
            bail!("no asset-class data available");
        }

        let view = AssetView {
            level: ctx.level,
            regime: ctx.regime.regime,
            th: thresholds(ctx.regime.regime),
            imp: &ctx.implications,
        };
        Ok(AssetSection {
            equities: snap.equities.as_ref().map(|d| view.equities(d)),
            fixed_income: snap.fixed_income.as_ref().map(|d| view.fixed_income(d)),
            fx: snap.fx.as_ref().map(|d| view.fx(d)),
            commodities: snap.commodities.as_ref().map(|d| view.commodities(d)),
            crypto: snap.crypto.as_ref().map(|d| view.crypto(d)),
        })
    }
}

struct AssetView<'a> {
    level: ReportLevel,
    regime: MarketRegime,
    th: MoveThresholds,
    imp: &'a RegimeImplications,
}

impl AssetView<'_> {
    fn detailed(&self) -> bool {
        self.level >= ReportLevel::Standard
    }

    // ---- equities ----

    fn equities(&self, d: &EquityData) -> EquityView {
        let label = self.regime.label();
        let spx_change = d.us.get("spx").map(change).unwrap_or(0.0);
        let headline = if spx_change.abs() > self.th.equity {
            let dir = if spx_change > 0.0 { "higher" } else { "lower" };
            format!("Equities pushing {dir} in {label} regime; S&P 500 {spx_change:+.1}%")
        } else {
            format!("Equities range-bound as {label} conditions persist; S&P 500 {spx_change:+.1}%")
        };

        EquityView {
            headline,
            us_indices: d.us.clone(),
            global_indices: d.global.clone(),
            sectors: d.sectors.clone(),
            vix: d.vix.clone(),
            commentary: self.equity_commentary(d),
        }
    }

    fn equity_commentary(&self, d: &EquityData) -> String {
        let mut parts = Vec::new();
        let label = self.regime.label();
        let spx = d.us.get("spx");

        if let Some(q) = spx {
            parts.push(format!("S&P 500 at {:.0} ({:+.2}%)", q.price, change(q)));
        }
        if let (Some(s), Some(n)) = (spx, d.us.get("nasdaq")) {
            let spread = change(n) - change(s);
            if spread > 0.5 {
                parts.push("Growth and tech outperforming; risk appetite tilting toward duration-sensitive names".to_string());
            } else if spread < -0.5 {
                parts.push("Broad market outperforming tech; rotation into cyclicals suggests shifting growth expectations".to_string());
            }
        }
        if let Some(vix) = &d.vix {
            if vix.price > self.th.vix_high {
                parts.push(format!(
                    "VIX elevated at {:.1}, above the {:.0} threshold typical for {label} regimes; hedging demand is rising",
                    vix.price, self.th.vix_high
                ));
            } else if vix.price < self.th.vix_low {
                parts.push(format!(
                    "VIX compressed at {:.1}, below {:.0}; complacency risk is elevated",
                    vix.price, self.th.vix_low
                ));
            }
        }

        if self.detailed() && !d.sectors.is_empty() {
            let mut ranked: Vec<(&String, f64)> = d.sectors.iter().map(|(k, v)| (k, *v)).collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            let leaders: Vec<&str> = ranked.iter().take(3).map(|(s, _)| s.as_str()).collect();
            let laggards: Vec<&str> = ranked
                .iter()
                .skip(ranked.len().saturating_sub(2))
                .map(|(s, _)| s.as_str())
                .collect();
            parts.push(format!("Sector leaders: {}. Laggards: {}", sector_list(&leaders), sector_list(&laggards)));

            let expected = sector_leaders(self.regime);
            let aligned: Vec<&str> = leaders.iter().copied().filter(|s| expected.contains(s)).collect();
            if !aligned.is_empty() {
                parts.push(format!(
                    "Rotation consistent with the {label} playbook ({} leading as expected)",
                    sector_list(&aligned)
                ));
            } else {
                parts.push(format!(
                    "Sector leadership diverges from regime expectation; {label} typically favors {}",
                    sector_list(&expected[..2])
                ));
            }
        }
        sentences(parts, "Equity markets trading mixed.")
    }

    // ---- fixed income ----

    fn fixed_income(&self, d: &FixedIncomeData) -> FixedIncomeView {
        let t10y = d.rates.get("treasury_10y").map(|p| p.value).unwrap_or(0.0);
        let spread = d.yield_curve.get("spread_2s10s").copied().flatten();
        let shape = curve_shape(spread);
        let headline = format!(
            "10Y at {t10y:.2}%, curve {shape}; regime bias: {}",
            self.imp.fixed_income_bias.as_str()
        );
        let credit_spreads: BTreeMap<String, f64> =
            d.credit.iter().map(|(k, p)| (k.clone(), p.value)).collect();

        FixedIncomeView {
            headline,
            yield_curve: d.yield_curve.clone(),
            commentary: self.fi_commentary(spread, d.credit.get("hy_spread").map(|p| p.value)),
            credit_spreads,
            curve_shape: shape.to_string(),
        }
    }

    fn fi_commentary(&self, spread: Option<f64>, hy: Option<f64>) -> String {
        let mut parts = Vec::new();
        let label = self.regime.label();
        if let Some(s) = spread {
            let bps = s * 100.0;
            if s < 0.0 {
                let read = if matches!(self.regime, MarketRegime::Stagflation | MarketRegime::RiskOff) {
                    "imminent stress"
                } else {
                    "the signal may be premature"
                };
                parts.push(format!(
                    "Yield curve inverted at {bps:.0}bps. Historically a recession lead, though timing is unreliable; current {label} conditions suggest {read}"
                ));
            } else if s < 0.5 {
                parts.push(format!(
                    "Curve flat at {bps:.0}bps; late-cycle dynamics, duration preference: {}",
                    self.imp.duration.unwrap_or("moderate")
                ));
            } else {
                parts.push(format!("Curve shape healthy at {bps:.0}bps, consistent with {label} regime"));
            }
        }
        if let (true, Some(hy)) = (self.detailed(), hy) {
            let bps = hy * 100.0;
            if bps > 500.0 {
                parts.push(format!("HY spreads wide at {bps:.0}bps; credit stress elevated, favor up-in-quality"));
            } else if bps < 300.0 {
                parts.push(format!("HY spreads tight at {bps:.0}bps; risk appetite strong but limited margin of safety"));
            }
        }
        sentences(parts, "Fixed income markets stable.")
    }

    // ---- fx ----

    fn fx(&self, d: &FxData) -> FxView {
        let dxy_change = d.dxy.as_ref().map(change).unwrap_or(0.0);
        let usd_bias = if dxy_change > self.th.fx {
            "bullish"
        } else if dxy_change < -self.th.fx {
            "bearish"
        } else {
            "neutral"
        };
        let dxy_val = d.dxy.as_ref().map(|q| q.price).unwrap_or(0.0);
        let headline = format!(
            "DXY at {dxy_val:.2}, USD {usd_bias}; regime expectation: {}",
            self.imp.fx_bias.weight_label()
        );
        FxView {
            headline,
            dxy: d.dxy.clone(),
            dm_pairs: d.dm_pairs.clone(),
            em_pairs: d.em_pairs.clone(),
            usd_bias: usd_bias.to_string(),
            commentary: self.fx_commentary(d),
        }
    }

    fn fx_commentary(&self, d: &FxData) -> String {
        let mut parts = Vec::new();
        if let Some(dxy) = &d.dxy {
            let c = change(dxy);
            if c.abs() > self.th.fx {
                let dir = if c > 0.0 { "strengthening" } else { "weakening" };
                parts.push(format!("Dollar {dir} ({c:+.2}%)"));
                let usd_favored = matches!(self.imp.fx_bias, FxBias::UsdBullish | FxBias::SafeHaven);
                match (self.imp.fx_bias, c > 0.0) {
                    (FxBias::UsdBullish, true) => parts.push("USD strength consistent with regime expectations".to_string()),
                    (FxBias::SafeHaven, true) => parts.push("Dollar bid aligns with safe-haven demand".to_string()),
                    (_, false) if usd_favored => parts.push(
                        "Dollar weakness diverges from regime expectations; watch for a regime shift".to_string(),
                    ),
                    _ => {}
                }
            }
        }
        if self.detailed() {
            if let Some(jpy) = d.dm_pairs.get("usdjpy") {
                if jpy.price > 155.0 {
                    parts.push(format!("USD/JPY at {:.1}; deep intervention territory, downside risk is asymmetric", jpy.price));
                } else if jpy.price > 150.0 {
                    parts.push(format!("USD/JPY elevated at {:.1}; verbal intervention likely", jpy.price));
                }
            }
            if let Some(eur) = d.dm_pairs.get("eurusd") {
                let c = change(eur);
                if c.abs() > self.th.fx {
                    let dir = if c > 0.0 { "firming" } else { "softening" };
                    parts.push(format!("EUR {dir} ({c:+.2}%) on the ECB-Fed policy differential"));
                }
            }
        }
        sentences(parts, "FX markets trading rangebound.")
    }

    // ---- commodities ----

    fn commodities(&self, d: &CommodityData) -> CommodityView {
        let gold = d.precious.get("gold").map(|q| q.price).unwrap_or(0.0);
        let wti = d.energy.get("wti_crude").map(|q| q.price).unwrap_or(0.0);
        CommodityView {
            headline: format!(
                "Gold ${gold:.0}, WTI ${wti:.1}; regime bias: {}",
                self.imp.commodity_bias.as_str()
            ),
            precious: d.precious.clone(),
            energy: d.energy.clone(),
            agriculture: if self.detailed() {
                d.agriculture.clone()
            } else {
                BTreeMap::new()
            },
            commentary: self.commodity_commentary(d),
        }
    }

    fn commodity_commentary(&self, d: &CommodityData) -> String {
        let mut parts = Vec::new();
        let gold = d.precious.get("gold");
        let wti = d.energy.get("wti_crude");
        let gold_focus = self.imp.commodity_focus.contains(&"gold");

        if let Some(g) = gold {
            let c = change(g);
            if c.abs() > self.th.gold {
                parts.push(format!("Gold {} ({c:+.2}%)", if c > 0.0 { "bid" } else { "offered" }));
                if gold_focus && c > 0.0 {
                    parts.push(format!("Gold strength aligns with the {} playbook", self.regime.label()));
                } else if gold_focus {
                    parts.push("Gold weakness despite a regime favoring precious metals; possible positioning unwind".to_string());
                }
            }
        }
        if let Some(o) = wti {
            let c = change(o);
            if c.abs() > self.th.oil {
                parts.push(format!("WTI {} ({c:+.2}%)", if c > 0.0 { "rallying" } else { "selling off" }));
                if self.regime == MarketRegime::InflationaryExpansion && c > 0.0 {
                    parts.push("Rising energy prices reinforce inflationary dynamics".to_string());
                } else if self.regime == MarketRegime::RiskOff && c < 0.0 {
                    parts.push("Oil weakness reflects growth concern".to_string());
                }
            }
        }
        if let (true, Some(g), Some(o)) = (self.detailed(), gold, wti) {
            if g.price > 0.0 && o.price > 0.0 {
                let ratio = g.price / o.price;
                if ratio > 35.0 {
                    parts.push(format!("Gold/oil ratio elevated at {ratio:.1}; pricing recession risk over inflation"));
                } else if ratio < 20.0 {
                    parts.push(format!("Gold/oil ratio compressed at {ratio:.1}; inflation and growth expectations both elevated"));
                }
            }
        }
        sentences(parts, "Commodities trading mixed.")
    }

    // ---- crypto ----

    fn crypto(&self, d: &CryptoData) -> CryptoView {
        let btc = d.assets.get("bitcoin").map(|q| q.price).unwrap_or(0.0);
        let eth = d.assets.get("ethereum").map(|q| q.price).unwrap_or(0.0);
        CryptoView {
            headline: format!(
                "BTC ${btc:.0}, ETH ${eth:.0}; regime bias: {}",
                self.imp.crypto_bias.as_str()
            ),
            major_coins: d.assets.clone(),
            market_overview: d.market_overview.clone(),
            fear_greed: d.fear_greed.clone(),
            commentary: self.crypto_commentary(d),
        }
    }

    fn crypto_commentary(&self, d: &CryptoData) -> String {
        let mut parts = Vec::new();
        if let Some(btc) = d.assets.get("bitcoin") {
            let c = change(btc);
            if c.abs() > self.th.btc {
                parts.push(format!("Bitcoin {} ({c:+.1}%)", if c > 0.0 { "surging" } else { "selling off" }));
            } else {
                parts.push(format!("Bitcoin consolidating ({c:+.1}%)"));
            }
            if let Some(eth) = d.assets.get("ethereum") {
                let spread = change(eth) - c;
                if spread > 3.0 {
                    parts.push("ETH outperforming BTC; risk appetite favoring higher-beta crypto".to_string());
                } else if spread < -3.0 {
                    parts.push("BTC outperforming ETH; flight to quality within crypto".to_string());
                }
            }
        }
        if let (true, Some(fg)) = (self.detailed(), &d.fear_greed) {
            parts.push(format!("Crypto Fear & Greed at {:.0}/100 ({})", fg.value, fg.label));
            if fg.value > 75.0 && self.imp.crypto_bias == Bias::Bearish {
                parts.push("Extreme greed amid a bearish regime; contrarian caution warranted".to_string());
            } else if fg.value < 25.0 && self.imp.crypto_bias == Bias::Bullish {
                parts.push("Extreme fear with a bullish regime backdrop; potential accumulation window".to_string());
            }
        }
        sentences(parts, "Crypto markets consolidating.")
    }
}

/// `inverted` below zero, `flat` under 0.5pp, `steep` above 1.5pp.
pub fn curve_shape(spread_2s10s: Option<f64>) -> &'static str {
    match spread_2s10s {
        Some(s) if s < 0.0 => "inverted",
        Some(s) if s < 0.5 => "flat",
        Some(s) if s > 1.5 => "steep",
        _ => "normal",
    }
}
