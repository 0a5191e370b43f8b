use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::ingest::cache::CallArgs;
use crate::ingest::source::DataSource;
use crate::ingest::types::{FixedIncomeData, HealthCheck, MacroData, SeriesPoint, SourceAdapter};

/// The yield curve moves intraday; the rest of the FRED series do not.
const YIELD_CURVE_TTL: Duration = Duration::from_secs(900);

/// Macro and fixed-income series (FRED).
pub struct FredSource {
    source: DataSource,
}

impl FredSource {
    pub const NAME: &'static str = "fred";

    pub fn new(source: DataSource) -> Self {
        Self { source }
    }

    pub async fn inflation(&self) -> Result<BTreeMap<String, SeriesPoint>> {
        self.source.call("inflation", CallArgs::none()).await
    }

    pub async fn growth(&self) -> Result<BTreeMap<String, SeriesPoint>> {
        self.source.call("growth", CallArgs::none()).await
    }

    pub async fn labor(&self) -> Result<BTreeMap<String, SeriesPoint>> {
        self.source.call("labor", CallArgs::none()).await
    }

    pub async fn rates(&self) -> Result<BTreeMap<String, SeriesPoint>> {
        self.source.call("rates", CallArgs::none()).await
    }

    pub async fn yield_curve(&self) -> Result<BTreeMap<String, Option<f64>>> {
        self.source
            .call_with_ttl("yield_curve", CallArgs::none(), Some(YIELD_CURVE_TTL))
            .await
    }

    pub async fn credit(&self) -> Result<BTreeMap<String, SeriesPoint>> {
        self.source.call("credit", CallArgs::none()).await
    }

    /// All-or-nothing: one failing series fails the whole category.
    pub async fn macro_data(&self) -> Result<MacroData> {
        let (inflation, growth, labor) =
            tokio::try_join!(self.inflation(), self.growth(), self.labor())?;
        Ok(MacroData {
            inflation,
            growth,
            labor,
        })
    }

    pub async fn fixed_income_data(&self) -> Result<FixedIncomeData> {
        let (rates, yield_curve, credit) =
            tokio::try_join!(self.rates(), self.yield_curve(), self.credit())?;
        Ok(FixedIncomeData {
            rates,
            yield_curve,
            credit,
        })
    }
}

#[async_trait]
impl HealthCheck for FredSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn health_check(&self) -> bool {
        self.source.ping().await
    }
}

#[async_trait]
impl SourceAdapter for FredSource {
    type Latest = MacroData;

    async fn fetch_latest(&self) -> Result<Option<MacroData>> {
        self.macro_data().await.map(Some)
    }
}
