use anyhow::Result;
use async_trait::async_trait;

use crate::ingest::cache::CallArgs;
use crate::ingest::source::DataSource;
use crate::ingest::types::{DailyClose, FxData, HealthCheck, Quote, SourceAdapter};

pub struct FxSource {
    source: DataSource,
}

impl FxSource {
    pub const NAME: &'static str = "fx";

    pub fn new(source: DataSource) -> Self {
        Self { source }
    }

    pub async fn fx_summary(&self) -> Result<FxData> {
        self.source.call("summary", CallArgs::none()).await
    }

    /// US dollar index.
    pub async fn dxy(&self) -> Result<Quote> {
        self.source.call("quote", CallArgs::positional(["DX-Y.NYB"])).await
    }

    /// Daily closes for `symbol` over the last `days` days, oldest first.
    pub async fn history(&self, symbol: &str, days: u32) -> Result<Vec<DailyClose>> {
        self.source
            .call("history", CallArgs::positional([symbol.to_string(), days.to_string()]))
            .await
    }
}

#[async_trait]
impl HealthCheck for FxSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn health_check(&self) -> bool {
        self.source.ping().await
    }
}

#[async_trait]
impl SourceAdapter for FxSource {
    type Latest = FxData;

    async fn fetch_latest(&self) -> Result<Option<FxData>> {
        self.fx_summary().await.map(Some)
    }
}
