// tests/rate_limiter.rs
use std::sync::Arc;
use std::time::Duration;

use marketview::ingest::{RateLimiter, RateLimiterRegistry};

#[tokio::test(start_paused = true)]
async fn burst_capacity_then_one_token_per_second() {
    let rl = RateLimiter::new(1.0, 3.0);
    for _ in 0..3 {
        assert!(rl.try_acquire(1.0));
    }
    assert!(!rl.try_acquire(1.0));

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(rl.try_acquire(1.0));
}

#[tokio::test(start_paused = true)]
async fn debits_never_exceed_capacity_plus_refill() {
    let rl = RateLimiter::new(1.0, 3.0);
    let mut taken = 0u32;
    for step in 0..50 {
        let n = if step % 3 == 0 { 2.0 } else { 1.0 };
        if rl.try_acquire(n) {
            taken += n as u32;
        }
        let tokens = rl.available_tokens();
        assert!((0.0..=3.0).contains(&tokens), "tokens out of range: {tokens}");
        tokio::time::advance(Duration::from_millis(200)).await;
    }
    // 50 steps * 200ms = 10s of refill on top of the initial burst.
    assert!(taken <= 3 + 10, "took {taken}");
    assert!(taken >= 10);
}

#[tokio::test(start_paused = true)]
async fn acquire_waits_for_the_deficit() {
    let rl = RateLimiter::new(2.0, 2.0);
    assert_eq!(rl.acquire(2.0).await, Duration::ZERO);

    let waited = rl.acquire(1.0).await;
    assert!((waited.as_secs_f64() - 0.5).abs() < 1e-6, "{waited:?}");
    assert!(rl.available_tokens() < 0.01);
}

#[tokio::test(start_paused = true)]
async fn oversized_request_is_clamped_not_stuck() {
    let rl = RateLimiter::new(1.0, 2.0);
    assert!(!rl.try_acquire(5.0));
    let waited = rl.acquire(5.0).await;
    assert_eq!(waited, Duration::ZERO);
    assert!(rl.available_tokens() < 0.01);
}

#[tokio::test(start_paused = true)]
async fn concurrent_acquirers_share_one_bucket() {
    let rl = Arc::new(RateLimiter::new(1.0, 2.0));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let rl = rl.clone();
            tokio::spawn(async move { rl.acquire(1.0).await })
        })
        .collect();
    let mut waits = Vec::new();
    for h in handles {
        waits.push(h.await.unwrap());
    }
    waits.sort();
    assert_eq!(waits[0], Duration::ZERO);
    assert_eq!(waits[1], Duration::ZERO);
    // The third sleeps one refill second; the fourth queues behind it and
    // then sleeps its own second.
    assert!((waits[2].as_secs_f64() - 1.0).abs() < 1e-3, "{waits:?}");
    assert!((waits[3].as_secs_f64() - 2.0).abs() < 1e-3, "{waits:?}");
    let total: f64 = waits.iter().map(|w| w.as_secs_f64()).sum();
    assert!((total - 3.0).abs() < 1e-3, "{waits:?}");
}

#[tokio::test(start_paused = true)]
async fn queued_time_counts_as_waiting() {
    let rl = Arc::new(RateLimiter::new(1.0, 1.0));
    assert!(rl.try_acquire(1.0));

    let first = tokio::spawn({
        let rl = rl.clone();
        async move { rl.acquire(1.0).await }
    });
    let second = tokio::spawn({
        let rl = rl.clone();
        async move {
            let start = tokio::time::Instant::now();
            let reported = rl.acquire(1.0).await;
            (reported, start.elapsed())
        }
    });

    let a = first.await.unwrap();
    let (b, blocked) = second.await.unwrap();
    assert!((a.as_secs_f64() - 1.0).abs() < 1e-3, "{a:?}");
    assert!((blocked.as_secs_f64() - 2.0).abs() < 1e-3, "{blocked:?}");
    assert!((b.as_secs_f64() - blocked.as_secs_f64()).abs() < 1e-3, "{b:?} vs {blocked:?}");
}

#[test]
fn registry_hands_out_one_limiter_per_name() {
    let reg = RateLimiterRegistry::new();
    let a = reg.get("fred", 120);
    let b = reg.get("fred", 5);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(b.capacity(), 120.0);
    assert!((a.rate() - 2.0).abs() < 1e-9);

    reg.get("crypto", 30);
    assert_eq!(reg.len(), 2);
    reg.reset(Some("fred"));
    assert_eq!(reg.len(), 1);
    assert!(!Arc::ptr_eq(&a, &reg.get("fred", 60)));
    reg.reset(None);
    assert!(reg.is_empty());
}

#[test]
fn zero_budget_is_one_per_minute() {
    let rl = RateLimiter::from_per_minute(0);
    assert_eq!(rl.capacity(), 1.0);
    assert!((rl.rate() - 1.0 / 60.0).abs() < 1e-12);
}
