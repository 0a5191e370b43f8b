use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::ingest::cache::CallArgs;
use crate::ingest::source::DataSource;
use crate::ingest::types::{DailyClose, EquityData, HealthCheck, Quote, SourceAdapter};

pub struct EquitySource {
    source: DataSource,
}

impl EquitySource {
    pub const NAME: &'static str = "equity";

    pub fn new(source: DataSource) -> Self {
        Self { source }
    }

    pub async fn us_indices(&self) -> Result<BTreeMap<String, Quote>> {
        self.source.call("us_indices", CallArgs::none()).await
    }

    pub async fn global_indices(&self) -> Result<BTreeMap<String, Quote>> {
        self.source.call("global_indices", CallArgs::none()).await
    }

    pub async fn sector_performance(&self) -> Result<BTreeMap<String, f64>> {
        self.source.call("sectors", CallArgs::none()).await
    }

    pub async fn vix(&self) -> Result<Option<Quote>> {
        self.source.call("vix", CallArgs::none()).await
    }

    pub async fn quote(&self, symbol: &str) -> Result<Quote> {
        self.source.call("quote", CallArgs::positional([symbol])).await
    }

    /// Daily closes for `symbol` over the last `days` days, oldest first.
    pub async fn history(&self, symbol: &str, days: u32) -> Result<Vec<DailyClose>> {
        self.source
            .call("history", CallArgs::positional([symbol.to_string(), days.to_string()]))
            .await
    }

    pub async fn equity_data(&self) -> Result<EquityData> {
        let (us, global, sectors, vix) = tokio::try_join!(
            self.us_indices(),
            self.global_indices(),
            self.sector_performance(),
            self.vix()
        )?;
        Ok(EquityData {
            us,
            global,
            sectors,
            vix,
        })
    }
}

#[async_trait]
impl HealthCheck for EquitySource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn health_check(&self) -> bool {
        self.source.ping().await
    }
}

#[async_trait]
impl SourceAdapter for EquitySource {
    type Latest = BTreeMap<String, Quote>;

    async fn fetch_latest(&self) -> Result<Option<Self::Latest>> {
        self.us_indices().await.map(Some)
    }
}
