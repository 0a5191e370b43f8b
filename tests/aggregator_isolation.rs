// tests/aggregator_isolation.rs
mod common;

use std::time::Duration;

use marketview::config::Timeouts;
use marketview::ingest::types::Category;
use marketview::ingest::{Aggregator, Cache};
use serde_json::Value;

use common::mock_sources;

fn no_delay(_: &str) -> Duration {
    Duration::ZERO
}

#[tokio::test(start_paused = true)]
async fn one_failing_source_costs_exactly_its_category() {
    let sources = mock_sources(Cache::disabled(), &["reddit"], no_delay).unwrap();
    let agg = Aggregator::from_sources(&sources, Timeouts::default());

    let snap = agg.snapshot().await;
    assert!(snap.sentiment.is_none());
    assert_eq!(snap.errors.len(), 1);
    assert_eq!(snap.errors[0].source, "sentiment");
    assert!(snap.errors[0].message.contains("reddit upstream unavailable"));
    for c in Category::ALL.into_iter().filter(|c| *c != Category::Sentiment) {
        assert!(snap.has(c), "{c} missing");
    }

    let healthy = mock_sources(Cache::disabled(), &[], no_delay).unwrap();
    let full = Aggregator::from_sources(&healthy, Timeouts::default()).snapshot().await;
    assert_eq!(snap.equities, full.equities);
    assert_eq!(snap.macro_data, full.macro_data);
    assert_eq!(snap.crypto, full.crypto);
}

#[tokio::test(start_paused = true)]
async fn a_source_feeding_two_categories_fails_both() {
    let sources = mock_sources(Cache::disabled(), &["fred"], no_delay).unwrap();
    let snap = Aggregator::from_sources(&sources, Timeouts::default()).snapshot().await;
    let failed: Vec<&str> = snap.errors.iter().map(|e| e.source.as_str()).collect();
    assert_eq!(failed, ["macro", "fixed_income"]);
    assert!(snap.equities.is_some() && snap.sentiment.is_some());
}

#[tokio::test(start_paused = true)]
async fn merge_order_ignores_completion_order() {
    let slow_first = |name: &str| match name {
        "fred" => Duration::from_millis(900),
        "equity" => Duration::from_millis(500),
        "crypto" => Duration::from_millis(300),
        _ => Duration::from_millis(10),
    };
    let slow_last = |name: &str| match name {
        "reddit" => Duration::from_millis(900),
        "commodity" => Duration::from_millis(700),
        "fx" => Duration::from_millis(400),
        _ => Duration::from_millis(5),
    };

    let a = mock_sources(Cache::disabled(), &["fx"], slow_first).unwrap();
    let b = mock_sources(Cache::disabled(), &["fx"], slow_last).unwrap();
    let mut snap_a = Aggregator::from_sources(&a, Timeouts::default()).snapshot().await;
    let snap_b = Aggregator::from_sources(&b, Timeouts::default()).snapshot().await;

    snap_a.timestamp = snap_b.timestamp;
    assert_eq!(snap_a, snap_b);
    assert_eq!(
        serde_json::to_string(&snap_a).unwrap(),
        serde_json::to_string(&snap_b).unwrap()
    );
}

#[tokio::test(start_paused = true)]
async fn slow_category_times_out_alone() {
    let slow_fx = |name: &str| {
        if name == "fx" {
            Duration::from_secs(120)
        } else {
            Duration::ZERO
        }
    };
    let timeouts = Timeouts {
        category_secs: 2,
        ..Timeouts::default()
    };
    let sources = mock_sources(Cache::disabled(), &[], slow_fx).unwrap();
    let snap = Aggregator::from_sources(&sources, timeouts).snapshot().await;

    assert!(snap.fx.is_none());
    assert_eq!(snap.errors.len(), 1);
    assert_eq!(snap.errors[0].source, "fx");
    assert!(snap.errors[0].message.contains("timed out"));
    assert!(snap.commodities.is_some());
}

#[tokio::test(start_paused = true)]
async fn quick_snapshot_has_a_fixed_key_set() {
    let sources = mock_sources(Cache::memory(), &["crypto"], no_delay).unwrap();
    let agg = Aggregator::from_sources(&sources, Timeouts::default());

    let quick = agg.quick_snapshot().await;
    for key in marketview::ingest::aggregator::QUICK_KEYS {
        assert!(quick.contains_key(key), "missing {key}");
    }
    assert_eq!(quick.len(), 7);
    assert_eq!(quick["bitcoin"], Value::Null);
    assert_eq!(quick["spx"]["price"], serde_json::json!(6000.0));
    assert_eq!(quick["yield_curve"]["spread_2s10s"], serde_json::json!(0.3));
}

#[tokio::test]
async fn health_map_names_every_provider() {
    let sources = mock_sources(Cache::memory(), &["crypto", "fx"], no_delay).unwrap();
    let health = Aggregator::from_sources(&sources, Timeouts::default())
        .health_check_all()
        .await;
    assert_eq!(health.len(), 6);
    assert_eq!(health.get("crypto"), Some(&false));
    assert_eq!(health.get("fx"), Some(&false));
    assert_eq!(health.get("fred"), Some(&true));
    assert_eq!(health.get("reddit"), Some(&true));
}
