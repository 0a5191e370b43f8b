use anyhow::Result;
use async_trait::async_trait;

use crate::ingest::cache::CallArgs;
use crate::ingest::source::DataSource;
use crate::ingest::types::{CommodityData, DailyClose, HealthCheck, Quote, SourceAdapter};

pub struct CommoditySource {
    source: DataSource,
}

impl CommoditySource {
    pub const NAME: &'static str = "commodity";

    pub fn new(source: DataSource) -> Self {
        Self { source }
    }

    pub async fn commodity_summary(&self) -> Result<CommodityData> {
        self.source.call("summary", CallArgs::none()).await
    }

    /// Single commodity by name (`gold`, `wti`, ...).
    pub async fn commodity(&self, name: &str) -> Result<Quote> {
        self.source
            .call("commodity", CallArgs::positional([name.to_ascii_lowercase()]))
            .await
    }

    pub async fn history(&self, name: &str, days: u32) -> Result<Vec<DailyClose>> {
        self.source
            .call(
                "history",
                CallArgs::positional([name.to_ascii_lowercase(), days.to_string()]),
            )
            .await
    }
}

#[async_trait]
impl HealthCheck for CommoditySource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn health_check(&self) -> bool {
        self.source.ping().await
    }
}

#[async_trait]
impl SourceAdapter for CommoditySource {
    type Latest = CommodityData;

    async fn fetch_latest(&self) -> Result<Option<CommodityData>> {
        self.commodity_summary().await.map(Some)
    }
}
