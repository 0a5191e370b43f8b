use anyhow::Result;
use async_trait::async_trait;

use crate::ingest::cache::CallArgs;
use crate::ingest::source::DataSource;
use crate::ingest::types::{HealthCheck, SentimentData, SourceAdapter};

pub const SUBREDDITS: [&str; 4] = ["wallstreetbets", "stocks", "investing", "cryptocurrency"];

/// Retail sentiment aggregated over a fixed subreddit set.
pub struct RedditSource {
    source: DataSource,
}

impl RedditSource {
    pub const NAME: &'static str = "reddit";

    pub fn new(source: DataSource) -> Self {
        Self { source }
    }

    pub async fn overall_sentiment(&self) -> Result<SentimentData> {
        self.source
            .call(
                "sentiment",
                CallArgs::positional([SUBREDDITS.join(",")]).with_kw("window", "24h"),
            )
            .await
    }
}

#[async_trait]
impl HealthCheck for RedditSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn health_check(&self) -> bool {
        self.source.ping().await
    }
}

#[async_trait]
impl SourceAdapter for RedditSource {
    type Latest = SentimentData;

    async fn fetch_latest(&self) -> Result<Option<SentimentData>> {
        let data = self.overall_sentiment().await?;
        Ok((data.total_posts > 0).then_some(data))
    }
}
