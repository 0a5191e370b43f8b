// src/ingest/providers/mod.rs
//! One adapter per upstream provider, wired from [`Settings`].

pub mod commodity;
pub mod crypto;
pub mod equity;
pub mod fred;
pub mod fx;
pub mod reddit;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::analyze::PriceHistory;
use crate::config::Settings;
use crate::ingest::cache::Cache;
use crate::ingest::rate_limiter::RateLimiterRegistry;
use crate::ingest::source::DataSource;
use crate::ingest::types::{DailyClose, HealthCheck};
use crate::ingest::upstream::{HttpUpstream, Upstream};

pub use commodity::CommoditySource;
pub use crypto::CryptoSource;
pub use equity::EquitySource;
pub use fred::FredSource;
pub use fx::FxSource;
pub use reddit::RedditSource;

/// Every configured provider adapter. Each one owns its own policy and its
/// own limiter from the shared registry.
#[derive(Clone)]
pub struct Sources {
    pub fred: Arc<FredSource>,
    pub equity: Arc<EquitySource>,
    pub fx: Arc<FxSource>,
    pub commodity: Arc<CommoditySource>,
    pub crypto: Arc<CryptoSource>,
    pub reddit: Arc<RedditSource>,
}

impl Sources {
    /// HTTP upstreams at the configured base URLs.
    pub fn from_settings(
        settings: &Settings,
        cache: Cache,
        limiters: &RateLimiterRegistry,
    ) -> Result<Self> {
        Self::with_upstreams(settings, cache, limiters, |name| {
            let up = HttpUpstream::new(
                &settings.source_base_url(name),
                settings.source_api_key(name),
                settings.timeouts.category(),
            )?;
            Ok(Arc::new(up) as Arc<dyn Upstream>)
        })
    }

    /// Same wiring with caller-provided raw fetchers (tests, alternative
    /// transports).
    pub fn with_upstreams<F>(
        settings: &Settings,
        cache: Cache,
        limiters: &RateLimiterRegistry,
        mut make_upstream: F,
    ) -> Result<Self>
    where
        F: FnMut(&'static str) -> Result<Arc<dyn Upstream>>,
    {
        let mut source = |name: &'static str| -> Result<DataSource> {
            Ok(DataSource::new(
                name,
                settings.source_policy(name),
                cache.clone(),
                limiters,
                make_upstream(name)?,
                settings.timeouts.health(),
            ))
        };

        Ok(Self {
            fred: Arc::new(FredSource::new(source(FredSource::NAME)?)),
            equity: Arc::new(EquitySource::new(source(EquitySource::NAME)?)),
            fx: Arc::new(FxSource::new(source(FxSource::NAME)?)),
            commodity: Arc::new(CommoditySource::new(source(CommoditySource::NAME)?)),
            crypto: Arc::new(CryptoSource::new(source(CryptoSource::NAME)?)),
            reddit: Arc::new(RedditSource::new(source(RedditSource::NAME)?)),
        })
    }

    /// Health probes in a fixed order.
    pub fn health_probes(&self) -> Vec<Arc<dyn HealthCheck>> {
        vec![
            self.fred.clone(),
            self.reddit.clone(),
            self.crypto.clone(),
            self.equity.clone(),
            self.fx.clone(),
            self.commodity.clone(),
        ]
    }
}

/// Correlation-universe asset names resolved to the provider that carries
/// their history.
#[async_trait]
impl PriceHistory for Sources {
    async fn daily_closes(&self, asset: &str, days: u32) -> Result<Vec<DailyClose>> {
        match asset {
            "SPX" => self.equity.history("^GSPC", days).await,
            "NDX" => self.equity.history("^IXIC", days).await,
            "VIX" => self.equity.history("^VIX", days).await,
            "US10Y" => self.equity.history("^TNX", days).await,
            "DXY" => self.fx.history("DX-Y.NYB", days).await,
            "EURUSD" => self.fx.history("EURUSD=X", days).await,
            "Gold" => self.commodity.history("gold", days).await,
            "WTI" => self.commodity.history("wti_crude", days).await,
            "BTC" => self.crypto.history("bitcoin", days).await,
            "ETH" => self.crypto.history("ethereum", days).await,
            other => bail!("no price history for {other}"),
        }
    }
}
