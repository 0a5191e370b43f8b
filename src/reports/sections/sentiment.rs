// src/reports/sections/sentiment.rs
//! Retail sentiment section. Fails when the snapshot has no sentiment data.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::reports::models::{ReportLevel, SentimentSection, SubredditBreakdown};
use crate::reports::sections::{SectionBuilder, SectionContext};

#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentBuilder;

#[async_trait]
impl SectionBuilder for SentimentBuilder {
    type Output = SentimentSection;

    fn name(&self) -> &'static str {
        "sentiment"
    }

    async fn build(&self, ctx: &SectionContext) -> Result<SentimentSection> {
        let data = ctx
            .snapshot
            .sentiment
            .as_ref()
            .ok_or_else(|| anyhow!("sentiment data unavailable"))?;
        let detailed = ctx.level >= ReportLevel::Standard;

        let mut breakdowns: Vec<SubredditBreakdown> = if detailed {
            data.subreddits
                .iter()
                .map(|s| SubredditBreakdown {
                    subreddit: s.subreddit.clone(),
                    sentiment_score: s.score,
                    bullish_ratio: s.bullish_ratio,
                    post_count: s.post_count,
                    top_tickers: s.top_tickers.iter().take(5).cloned().collect(),
                })
                .collect()
        } else {
            Vec::new()
        };
        breakdowns.sort_by(|a, b| b.sentiment_score.abs().total_cmp(&a.sentiment_score.abs()));

        let contrarian = if detailed {
            contrarian_signals(&breakdowns, data.overall_score)
        } else {
            Vec::new()
        };

        Ok(SentimentSection {
            overall_score: data.overall_score,
            overall_label: score_label(data.overall_score).to_string(),
            bullish_ratio: data.bullish_ratio,
            total_posts: data.total_posts,
            subreddit_count: data.subreddits.len(),
            trending_tickers: data.trending_tickers.iter().take(10).cloned().collect(),
            narrative: narrative(
                data.overall_score,
                data.bullish_ratio,
                &data.trending_tickers,
                &breakdowns,
            ),
            subreddit_breakdowns: breakdowns,
            contrarian_signals: contrarian,
        })
    }
}

pub fn score_label(score: f64) -> &'static str {
    if score > 0.2 {
        "Bullish"
    } else if score < -0.2 {
        "Bearish"
    } else {
        "Neutral"
    }
}

fn narrative(
    score: f64,
    bullish_ratio: f64,
    trending: &[(String, u32)],
    breakdowns: &[SubredditBreakdown],
) -> String {
    let mut parts = vec![format!(
        "Retail sentiment across investor communities is **{}** with an overall score of \
         {score:+.2} and {:.0}% of discussion leaning bullish.",
        score_label(score).to_ascii_lowercase(),
        bullish_ratio * 100.0
    )];

    if !trending.is_empty() {
        let top: Vec<String> = trending.iter().take(5).map(|(t, _)| format!("${t}")).collect();
        parts.push(format!("Most-discussed tickers: {}.", top.join(", ")));
    }

    let most_bullish = breakdowns.iter().max_by(|a, b| a.sentiment_score.total_cmp(&b.sentiment_score));
    let most_bearish = breakdowns.iter().min_by(|a, b| a.sentiment_score.total_cmp(&b.sentiment_score));
    if let Some(b) = most_bullish.filter(|b| b.sentiment_score > 0.0) {
        parts.push(format!(
            "r/{} is the most bullish community ({:+.2}).",
            b.subreddit, b.sentiment_score
        ));
    }
    if let Some(b) = most_bearish.filter(|b| b.sentiment_score < 0.0) {
        parts.push(format!(
            "r/{} tilts most bearish ({:+.2}).",
            b.subreddit, b.sentiment_score
        ));
    }
    parts.join(" ")
}

fn contrarian_signals(breakdowns: &[SubredditBreakdown], overall: f64) -> Vec<String> {
    let mut out = Vec::new();
    if overall > 0.5 {
        out.push("Extreme bullish consensus, historically a contrarian sell signal".to_string());
    } else if overall < -0.5 {
        out.push("Extreme bearish consensus, historically a contrarian buy signal".to_string());
    }

    if breakdowns.len() >= 2 {
        let max = breakdowns.iter().map(|b| b.sentiment_score).fold(f64::MIN, f64::max);
        let min = breakdowns.iter().map(|b| b.sentiment_score).fold(f64::MAX, f64::min);
        let spread = max - min;
        if spread > 0.6 {
            out.push(format!(
                "Wide sentiment dispersion across communities (spread: {spread:.2}) suggests \
                 uncertainty and potential for sharp moves"
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::RuleRegimeClassifier;
    use crate::ingest::Snapshot;
    use crate::reports::sections::fixtures::full_snapshot;
    use std::sync::Arc;

    fn ctx(level: ReportLevel, snap: Snapshot) -> SectionContext {
        SectionContext::new(level, Arc::new(snap), &RuleRegimeClassifier)
    }

    #[tokio::test]
    async fn missing_sentiment_fails_the_section() {
        let err = SentimentBuilder
            .build(&ctx(ReportLevel::Standard, Snapshot::empty()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unavailable"));
    }

    #[tokio::test]
    async fn standard_section_ranks_communities_by_conviction() {
        let s = SentimentBuilder
            .build(&ctx(ReportLevel::Standard, full_snapshot()))
            .await
            .unwrap();
        assert_eq!(s.overall_label, "Bullish");
        assert_eq!(s.subreddit_count, 2);
        assert_eq!(s.subreddit_breakdowns[0].subreddit, "wallstreetbets");
        assert!(s.narrative.contains("r/wallstreetbets is the most bullish community (+0.60)."));
        assert!(s.narrative.contains("r/investing tilts most bearish (-0.10)."));
        // 0.6 - (-0.1) = 0.7 spread
        assert_eq!(s.contrarian_signals.len(), 1);
        assert!(s.contrarian_signals[0].starts_with("Wide sentiment dispersion"));
    }

    #[tokio::test]
    async fn brief_section_skips_breakdowns() {
        let s = SentimentBuilder
            .build(&ctx(ReportLevel::Brief, full_snapshot()))
            .await
            .unwrap();
        assert!(s.subreddit_breakdowns.is_empty());
        assert!(s.contrarian_signals.is_empty());
        assert!(s.narrative.contains("$NVDA, $TSLA"));
    }

    #[test]
    fn labels_use_symmetric_band() {
        assert_eq!(score_label(0.21), "Bullish");
        assert_eq!(score_label(-0.21), "Bearish");
        assert_eq!(score_label(0.2), "Neutral");
    }
}
