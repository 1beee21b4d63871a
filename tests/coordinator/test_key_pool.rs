// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Key pool rotation, spacing and budget tests

use caption_gate::keypool::{Exhaustion, KeyPool, KeyPoolConfig, KeyPoolError};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn pool_config(keys: usize, spacing_ms: u64, budget: u64) -> KeyPoolConfig {
    KeyPoolConfig {
        keys: (0..keys).map(|i| format!("sk-live-{:08}", i)).collect(),
        min_spacing_ms: spacing_ms,
        daily_budget: budget,
        rate_limit_cooldown_secs: 65,
    }
}

fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap()
}

#[test]
fn test_all_spaced_then_available_again() {
    let pool = KeyPool::new_at(&pool_config(2, 3000, 100), morning()).unwrap();
    let t0 = morning();

    assert_eq!(pool.acquire_at(t0).unwrap().id(), "key-0");
    assert_eq!(
        pool.acquire_at(t0 + Duration::milliseconds(500)).unwrap().id(),
        "key-1"
    );

    match pool.acquire_at(t0 + Duration::milliseconds(1000)) {
        Err(KeyPoolError::Exhausted(Exhaustion::Cooldown { retry_after })) => {
            assert_eq!(retry_after, std::time::Duration::from_millis(2000));
        }
        other => panic!("expected cooldown exhaustion, got {:?}", other),
    }

    let lease = pool.acquire_at(t0 + Duration::milliseconds(3000)).unwrap();
    assert_eq!(lease.id(), "key-0");
    assert_eq!(pool.status_at(t0 + Duration::seconds(4)).daily_used, 3);
}

#[test]
fn test_budget_resets_at_utc_midnight() {
    let pool = KeyPool::new_at(&pool_config(1, 0, 2), morning()).unwrap();
    pool.acquire_at(morning()).unwrap();
    pool.acquire_at(morning()).unwrap();

    let midnight = Utc.with_ymd_and_hms(2025, 6, 11, 0, 0, 0).unwrap();
    assert_eq!(
        pool.acquire_at(morning()).unwrap_err(),
        KeyPoolError::Exhausted(Exhaustion::DailyBudget {
            resets_at: midnight
        })
    );

    let next_day = midnight + Duration::minutes(1);
    pool.acquire_at(next_day).unwrap();
    let status = pool.status_at(next_day);
    assert_eq!(status.daily_used, 1);
    assert_eq!(status.daily_reset_date, next_day.date_naive());
}

#[test]
fn test_deactivated_credentials_are_skipped() {
    let pool = KeyPool::new_at(&pool_config(3, 0, 100), morning()).unwrap();
    pool.deactivate("key-1").unwrap();

    let ids: Vec<String> = (0..4)
        .map(|_| pool.acquire_at(morning()).unwrap().id().to_string())
        .collect();
    assert_eq!(ids, vec!["key-0", "key-2", "key-0", "key-2"]);

    pool.deactivate("key-0").unwrap();
    pool.deactivate("key-2").unwrap();
    assert_eq!(
        pool.acquire_at(morning()).unwrap_err(),
        KeyPoolError::Exhausted(Exhaustion::NoActiveCredentials)
    );

    assert_eq!(pool.reactivate_all(), 3);
    assert_eq!(pool.status_at(morning()).active, 3);
}

#[test]
fn test_cooldown_never_shortens() {
    let pool = KeyPool::new_at(&pool_config(1, 0, 100), morning()).unwrap();
    pool.cool_down_at("key-0", Duration::seconds(65), morning())
        .unwrap();
    pool.cool_down_at("key-0", Duration::seconds(5), morning())
        .unwrap();

    assert!(pool.acquire_at(morning() + Duration::seconds(30)).is_err());
    assert!(pool.acquire_at(morning() + Duration::seconds(66)).is_ok());
}

#[test]
fn test_unknown_credential() {
    let pool = KeyPool::new_at(&pool_config(1, 0, 100), morning()).unwrap();
    assert_eq!(
        pool.deactivate("key-9").unwrap_err(),
        KeyPoolError::UnknownCredential("key-9".to_string())
    );
}

#[test]
fn test_status_never_exposes_secrets() {
    let pool = KeyPool::new_at(&pool_config(2, 0, 100), morning()).unwrap();
    let json = serde_json::to_string(&pool.status_at(morning())).unwrap();
    assert!(!json.contains("sk-live-00000000"));
    assert!(json.contains("maskedSecret"));
}

#[test]
fn test_empty_pool_is_rejected() {
    let result = KeyPool::new(&pool_config(0, 0, 100));
    assert!(matches!(result, Err(KeyPoolError::InvalidConfig(_))));
}
