use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::ingest::cache::CallArgs;
use crate::ingest::source::DataSource;
use crate::ingest::types::{
    CryptoData, CryptoOverview, DailyClose, FearGreed, HealthCheck, Quote, SourceAdapter,
};

pub const MAJOR_COINS: [&str; 5] = ["bitcoin", "ethereum", "solana", "binancecoin", "ripple"];

pub struct CryptoSource {
    source: DataSource,
}

impl CryptoSource {
    pub const NAME: &'static str = "crypto";

    pub fn new(source: DataSource) -> Self {
        Self { source }
    }

    pub async fn coins(&self, ids: &[&str]) -> Result<BTreeMap<String, Quote>> {
        self.source
            .call("coins", CallArgs::positional([ids.join(",")]))
            .await
    }

    pub async fn coin(&self, id: &str) -> Result<Quote> {
        let mut coins = self.coins(&[id]).await?;
        coins
            .remove(id)
            .ok_or_else(|| anyhow!("crypto: no quote for {id}"))
    }

    pub async fn market_overview(&self) -> Result<Option<CryptoOverview>> {
        self.source.call("market_overview", CallArgs::none()).await
    }

    pub async fn fear_greed(&self) -> Result<Option<FearGreed>> {
        self.source.call("fear_greed", CallArgs::none()).await
    }

    /// Daily closes for coin `id`, oldest first.
    pub async fn history(&self, id: &str, days: u32) -> Result<Vec<DailyClose>> {
        self.source
            .call("history", CallArgs::positional([id.to_string(), days.to_string()]))
            .await
    }

    pub async fn crypto_data(&self) -> Result<CryptoData> {
        let (assets, market_overview, fear_greed) = tokio::try_join!(
            self.coins(&MAJOR_COINS),
            self.market_overview(),
            self.fear_greed()
        )?;
        Ok(CryptoData {
            assets,
            market_overview,
            fear_greed,
        })
    }
}

#[async_trait]
impl HealthCheck for CryptoSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn health_check(&self) -> bool {
        self.source.ping().await
    }
}

#[async_trait]
impl SourceAdapter for CryptoSource {
    type Latest = BTreeMap<String, Quote>;

    async fn fetch_latest(&self) -> Result<Option<Self::Latest>> {
        let coins = self.coins(&MAJOR_COINS).await?;
        Ok((!coins.is_empty()).then_some(coins))
    }
}
