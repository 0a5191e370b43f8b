// tests/cache_policy.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use marketview::ingest::providers::{EquitySource, RedditSource};
use marketview::ingest::upstream::Upstream;
use marketview::ingest::{Cache, CallArgs, DataSource, RateLimiterRegistry, SourcePolicy};

use common::{BrokenStore, MockUpstream};

fn equity(cache: Cache, up: &Arc<MockUpstream>, limiters: &RateLimiterRegistry) -> EquitySource {
    EquitySource::new(DataSource::new(
        "equity",
        SourcePolicy::new(900, 33),
        cache,
        limiters,
        up.clone() as Arc<dyn Upstream>,
        Duration::from_secs(5),
    ))
}

#[tokio::test(start_paused = true)]
async fn healthy_cache_serves_the_second_call() {
    let up = Arc::new(MockUpstream::new("equity"));
    let limiters = RateLimiterRegistry::new();
    let src = equity(Cache::memory(), &up, &limiters);

    let first = src.us_indices().await.unwrap();
    let second = src.us_indices().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(up.call_count(), 1);
    assert!(first.contains_key("spx"));
}

#[tokio::test(start_paused = true)]
async fn cache_hit_costs_no_token() {
    let up = Arc::new(MockUpstream::new("equity"));
    let limiters = RateLimiterRegistry::new();
    let src = equity(Cache::memory(), &up, &limiters);
    let limiter = limiters.get("equity", 33);

    src.vix().await.unwrap();
    let after_miss = limiter.available_tokens();
    assert!((after_miss - 32.0).abs() < 1e-6);
    src.vix().await.unwrap();
    assert!((limiter.available_tokens() - after_miss).abs() < 1e-6);
}

#[tokio::test(start_paused = true)]
async fn entries_expire_after_the_source_ttl() {
    let up = Arc::new(MockUpstream::new("equity"));
    let limiters = RateLimiterRegistry::new();
    let src = equity(Cache::memory(), &up, &limiters);

    src.sector_performance().await.unwrap();
    tokio::time::advance(Duration::from_secs(899)).await;
    src.sector_performance().await.unwrap();
    assert_eq!(up.call_count(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    src.sector_performance().await.unwrap();
    assert_eq!(up.call_count(), 2);
}

#[tokio::test]
async fn dead_cache_degrades_to_direct_fetch() {
    let up = Arc::new(MockUpstream::new("equity"));
    let limiters = RateLimiterRegistry::new();
    let src = equity(Cache::new(Arc::new(BrokenStore)), &up, &limiters);

    let a = src.quote("^GSPC").await.unwrap();
    let b = src.quote("^GSPC").await.unwrap();
    assert_eq!(a, b);
    assert_eq!(up.call_count(), 2);
}

#[tokio::test]
async fn disabled_cache_behaves_the_same() {
    let up = Arc::new(MockUpstream::new("equity"));
    let limiters = RateLimiterRegistry::new();
    let src = equity(Cache::disabled(), &up, &limiters);

    src.vix().await.unwrap();
    src.vix().await.unwrap();
    assert_eq!(up.call_count(), 2);
}

#[tokio::test]
async fn errors_are_never_cached() {
    let up = Arc::new(MockUpstream::failing("equity"));
    let limiters = RateLimiterRegistry::new();
    let src = equity(Cache::memory(), &up, &limiters);

    assert!(src.us_indices().await.is_err());
    assert!(src.us_indices().await.is_err());
    assert_eq!(up.call_count(), 2);
}

#[tokio::test]
async fn distinct_arguments_use_distinct_entries() {
    let up = Arc::new(MockUpstream::new("equity"));
    let limiters = RateLimiterRegistry::new();
    let src = equity(Cache::memory(), &up, &limiters);

    let spx = src.quote("^GSPC").await.unwrap();
    let ndx = src.quote("^IXIC").await.unwrap();
    assert_eq!(spx.symbol, "^GSPC");
    assert_eq!(ndx.symbol, "^IXIC");
    assert_eq!(up.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn keyword_args_reach_the_upstream() {
    let up = Arc::new(MockUpstream::new("reddit"));
    let limiters = RateLimiterRegistry::new();
    let src = RedditSource::new(DataSource::new(
        "reddit",
        SourcePolicy::new(900, 60),
        Cache::memory(),
        &limiters,
        up.clone() as Arc<dyn Upstream>,
        Duration::from_secs(5),
    ));

    src.overall_sentiment().await.unwrap();
    let received = up.received();
    assert_eq!(received.len(), 1);
    let (method, args) = &received[0];
    assert_eq!(method, "sentiment");
    assert_eq!(args.keyword.get("window").map(String::as_str), Some("24h"));
    assert_eq!(args.positional.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn calls_differing_only_by_keyword_are_distinct_requests() {
    let up = Arc::new(MockUpstream::new("reddit"));
    let limiters = RateLimiterRegistry::new();
    let src = DataSource::new(
        "reddit",
        SourcePolicy::new(900, 60),
        Cache::memory(),
        &limiters,
        up.clone() as Arc<dyn Upstream>,
        Duration::from_secs(5),
    );

    let day = CallArgs::positional(["stocks"]).with_kw("window", "24h");
    let week = CallArgs::positional(["stocks"]).with_kw("window", "7d");
    let _: serde_json::Value = src.call("sentiment", day.clone()).await.unwrap();
    let _: serde_json::Value = src.call("sentiment", week.clone()).await.unwrap();
    let _: serde_json::Value = src.call("sentiment", day.clone()).await.unwrap();

    let sent: Vec<CallArgs> = up.received().into_iter().map(|(_, a)| a).collect();
    assert_eq!(sent, vec![day, week]);
}
