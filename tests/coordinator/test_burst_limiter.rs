// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Burst limiter window tests

use caption_gate::limiter::{BurstConfig, BurstDecision, BurstLimiter};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn test_default_window_allows_ten_per_minute() {
    let limiter = BurstLimiter::new(&BurstConfig::default());
    let t0 = Instant::now();

    for _ in 0..10 {
        assert!(limiter.check_at("anon:1.2.3.4", t0).is_allowed());
    }
    match limiter.check_at("anon:1.2.3.4", t0 + Duration::from_secs(20)) {
        BurstDecision::Limited { retry_after } => {
            assert_eq!(retry_after, Duration::from_secs(40))
        }
        other => panic!("expected limit, got {:?}", other),
    }

    // The window is fixed, not sliding
    assert!(limiter
        .check_at("anon:1.2.3.4", t0 + Duration::from_secs(60))
        .is_allowed());
}

#[test]
fn test_rejected_requests_do_not_extend_window() {
    let limiter = BurstLimiter::with_window(1, Duration::from_secs(10));
    let t0 = Instant::now();

    assert!(limiter.allow_at("k", t0));
    for s in 1..10 {
        assert!(!limiter.allow_at("k", t0 + Duration::from_secs(s)));
    }
    assert!(limiter.allow_at("k", t0 + Duration::from_secs(10)));
}

#[test]
fn test_identities_are_independent() {
    let limiter = BurstLimiter::with_window(1, Duration::from_secs(60));
    let t0 = Instant::now();
    assert!(limiter.allow_at("anon:1.1.1.1", t0));
    assert!(limiter.allow_at("anon:2.2.2.2", t0));
    assert!(!limiter.allow_at("anon:1.1.1.1", t0));
    assert_eq!(limiter.tracked(), 2);
}

#[test]
fn test_sweep_keeps_entries_inside_grace() {
    let limiter =
        BurstLimiter::with_window(5, Duration::from_secs(60)).with_grace(Duration::from_secs(60));
    let t0 = Instant::now();
    limiter.allow_at("a", t0);
    limiter.allow_at("b", t0 + Duration::from_secs(90));

    assert_eq!(limiter.sweep_expired_at(t0 + Duration::from_secs(100)), 0);
    assert_eq!(limiter.sweep_expired_at(t0 + Duration::from_secs(121)), 1);
    assert_eq!(limiter.tracked(), 1);
}

#[tokio::test]
async fn test_concurrent_checks_never_exceed_limit() {
    let limiter = Arc::new(BurstLimiter::with_window(10, Duration::from_secs(60)));
    let t0 = Instant::now();

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.allow_at("shared", t0) })
        })
        .collect();

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 10);
}
