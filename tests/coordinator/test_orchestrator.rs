// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! End-to-end pipeline tests for CaptionService
//!
//! Every test drives `generate` against a MemoryStore and a scripted backend
//! and checks both the classified outcome and the side effects on quota, the
//! key pool and the cache.

use super::common::{harness, request, test_config, wait_for_cache_entries, ScriptedBackend};
use caption_gate::{
    blocklist::{BlockReason, BlockTarget},
    generation::BackendError,
    keypool::MAX_COOLDOWN_SECS,
    orchestrator::{CaptionError, Identity, MaintenanceConfig, MaintenanceTask},
    quota::QuotaTier,
    store::{PersistentStore, StoreError},
};
use chrono::{Datelike, Duration as ChronoDuration, TimeZone, Utc};
use std::time::{Duration, Instant};

fn next_month_start() -> chrono::DateTime<Utc> {
    let now = Utc::now();
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap()
}

#[tokio::test]
async fn test_anonymous_quota_exhausts_after_five() {
    let h = harness(&test_config(2), ScriptedBackend::new());
    let anon = Identity::anonymous("1.2.3.4");

    for i in 0..5u32 {
        let url = format!("https://img.example/{}.jpg", i);
        let response = h.service.generate(&request(anon.clone(), &url, "funny")).await.unwrap();
        assert!(!response.from_cache);
        assert_eq!(response.captions.len(), 3);
        assert_eq!(response.remaining_quota, Some(4 - i));
    }

    let err = h
        .service
        .generate(&request(anon.clone(), "https://img.example/6.jpg", "funny"))
        .await
        .unwrap_err();
    match err {
        CaptionError::QuotaExceeded {
            tier,
            reset_at,
            retry_after_secs,
        } => {
            assert_eq!(tier, QuotaTier::Anonymous);
            assert_eq!(reset_at, next_month_start());
            assert!(retry_after_secs > 0);
        }
        other => panic!("expected quota_exceeded, got {:?}", other),
    }
    assert_eq!(h.backend.calls(), 5);

    // Signed-in user behind the same IP has an independent quota
    let user = Identity::user("user-42", "1.2.3.4");
    let response = h
        .service
        .generate(&request(user, "https://img.example/7.jpg", "funny"))
        .await
        .unwrap();
    assert_eq!(response.remaining_quota, Some(49));
}

#[tokio::test]
async fn test_cache_hit_skips_quota_and_credentials() {
    let h = harness(&test_config(1), ScriptedBackend::new());
    let anon = Identity::anonymous("1.2.3.4");
    let url = "https://img.example/cat.jpg";

    let first = h.service.generate(&request(anon.clone(), url, "funny")).await.unwrap();
    assert!(!first.from_cache);
    wait_for_cache_entries(&h.store, 1).await;

    // Mood is compared case-insensitively after trimming
    let second = h
        .service
        .generate(&request(anon.clone(), url, " Funny "))
        .await
        .unwrap();
    assert!(second.from_cache);
    assert_eq!(second.captions, first.captions);
    assert_eq!(second.remaining_quota, None);

    assert_eq!(h.backend.calls(), 1);
    assert_eq!(h.service.pool().status().daily_used, 1);
    let quota = h.service.quota_remaining("1.2.3.4").await.unwrap();
    assert_eq!(quota.used, 1);

    let stats = h.service.cache().stats().await.unwrap();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(h.service.metrics().outcome_count("cache_hit"), 1);
    assert_eq!(h.service.metrics().outcome_count("success"), 1);
}

#[tokio::test]
async fn test_different_mood_is_a_cache_miss() {
    let h = harness(&test_config(1), ScriptedBackend::new());
    let anon = Identity::anonymous("1.2.3.4");
    let url = "https://img.example/cat.jpg";

    h.service.generate(&request(anon.clone(), url, "funny")).await.unwrap();
    wait_for_cache_entries(&h.store, 1).await;

    let response = h.service.generate(&request(anon, url, "romantic")).await.unwrap();
    assert!(!response.from_cache);
    assert_eq!(h.backend.calls(), 2);
}

#[tokio::test]
async fn test_spaced_credentials_report_capacity_exhausted() {
    let mut config = test_config(2);
    config.keys.min_spacing_ms = 60_000;
    let h = harness(&config, ScriptedBackend::new());
    let user = Identity::user("u1", "9.9.9.9");

    for i in 0..2 {
        let url = format!("https://img.example/{}.jpg", i);
        h.service.generate(&request(user.clone(), &url, "calm")).await.unwrap();
    }
    assert_eq!(h.backend.credentials_seen(), vec!["key-0", "key-1"]);

    let err = h
        .service
        .generate(&request(user.clone(), "https://img.example/3.jpg", "calm"))
        .await
        .unwrap_err();
    assert_eq!(err.error_kind(), "capacity_exhausted");
    assert_eq!(err.status_code(), 503);
    let retry = err.retry_after_secs().expect("cooldown has a retry hint");
    assert!((1..=60).contains(&retry), "retry after {}", retry);
    assert_eq!(h.backend.calls(), 2);

    // Without a refund the reservation made before selection stays consumed
    let quota = h.service.quota_remaining("user:u1").await.unwrap();
    assert_eq!(quota.used, 3);
}

#[tokio::test]
async fn test_daily_budget_exhaustion() {
    let mut config = test_config(3);
    config.keys.daily_budget = 1;
    let h = harness(&config, ScriptedBackend::new());
    let user = Identity::user("u1", "9.9.9.9");

    h.service
        .generate(&request(user.clone(), "https://img.example/a.jpg", "calm"))
        .await
        .unwrap();
    let err = h
        .service
        .generate(&request(user, "https://img.example/b.jpg", "calm"))
        .await
        .unwrap_err();
    match err {
        CaptionError::CapacityExhausted { reason, retry_after_secs } => {
            assert!(reason.contains("daily budget"));
            assert!(retry_after_secs.unwrap() <= 86_400);
        }
        other => panic!("expected capacity_exhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_backend_rate_limit_cools_credential_down() {
    let h = harness(&test_config(1), ScriptedBackend::new());
    h.backend.push(Err(BackendError::RateLimited {
        retry_after_secs: Some(30),
    }));
    let anon = Identity::anonymous("1.2.3.4");

    let err = h
        .service
        .generate(&request(anon.clone(), "https://img.example/a.jpg", "funny"))
        .await
        .unwrap_err();
    assert_eq!(err.error_kind(), "generation_failed");

    let status = h.service.pool().status();
    assert_eq!(status.cooling_down, 1);
    assert_eq!(status.active, 1);

    let err = h
        .service
        .generate(&request(anon, "https://img.example/b.jpg", "funny"))
        .await
        .unwrap_err();
    assert_eq!(err.error_kind(), "capacity_exhausted");
    let retry = err.retry_after_secs().unwrap();
    assert!((29..=30).contains(&retry), "retry after {}", retry);
    assert_eq!(h.backend.calls(), 1);
}

#[tokio::test]
async fn test_oversized_retry_after_is_capped() {
    let h = harness(&test_config(1), ScriptedBackend::new());
    h.backend.push(Err(BackendError::RateLimited {
        retry_after_secs: Some(10_000_000_000_000),
    }));
    let anon = Identity::anonymous("1.2.3.4");

    let err = h
        .service
        .generate(&request(anon.clone(), "https://img.example/a.jpg", "funny"))
        .await
        .unwrap_err();
    assert_eq!(err.error_kind(), "generation_failed");

    let status = h.service.pool().status();
    assert_eq!(status.cooling_down, 1);
    let until = status.credentials[0].cooldown_until.unwrap();
    assert!(until <= Utc::now() + ChronoDuration::seconds(MAX_COOLDOWN_SECS as i64));

    // The pool is still usable after the oversized hint
    let err = h
        .service
        .generate(&request(anon, "https://img.example/b.jpg", "funny"))
        .await
        .unwrap_err();
    assert_eq!(err.error_kind(), "capacity_exhausted");
    assert!(err.retry_after_secs().unwrap() <= MAX_COOLDOWN_SECS);
}

#[tokio::test]
async fn test_rejected_credential_is_deactivated() {
    let h = harness(&test_config(2), ScriptedBackend::new());
    h.backend
        .push(Err(BackendError::CredentialRejected { status: 401 }));
    let anon = Identity::anonymous("1.2.3.4");

    let err = h
        .service
        .generate(&request(anon.clone(), "https://img.example/a.jpg", "funny"))
        .await
        .unwrap_err();
    assert_eq!(err.error_kind(), "generation_failed");

    let status = h.service.pool().status();
    assert_eq!(status.active, 1);
    assert_eq!(status.inactive, 1);
    assert!(!status.credentials[0].is_active);

    h.service
        .generate(&request(anon, "https://img.example/b.jpg", "funny"))
        .await
        .unwrap();
    assert_eq!(h.backend.credentials_seen(), vec!["key-0", "key-1"]);
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let mut config = test_config(1);
    config.generation.timeout_ms = 50;
    let h = harness(&config, ScriptedBackend::slow(Duration::from_millis(500)));

    let err = h
        .service
        .generate(&request(
            Identity::anonymous("1.2.3.4"),
            "https://img.example/a.jpg",
            "funny",
        ))
        .await
        .unwrap_err();
    assert!(
        matches!(err, CaptionError::GenerationFailed(ref m) if m.contains("timeout")),
        "unexpected error {:?}",
        err
    );
    assert_eq!(h.service.metrics().outcome_count("generation_failed"), 1);
}

#[tokio::test]
async fn test_short_backend_answer_is_generation_failure() {
    let h = harness(&test_config(1), ScriptedBackend::new());
    h.backend.push(Ok(vec!["only one".to_string()]));

    let err = h
        .service
        .generate(&request(
            Identity::anonymous("1.2.3.4"),
            "https://img.example/a.jpg",
            "funny",
        ))
        .await
        .unwrap_err();
    assert_eq!(err.error_kind(), "generation_failed");
    assert_eq!(h.store.count_cache_entries().await.unwrap(), 0);
}

#[tokio::test]
async fn test_extra_captions_are_truncated() {
    let h = harness(&test_config(1), ScriptedBackend::new());
    h.backend
        .push(Ok((0..5).map(|i| format!("caption {}", i)).collect()));

    let response = h
        .service
        .generate(&request(
            Identity::anonymous("1.2.3.4"),
            "https://img.example/a.jpg",
            "funny",
        ))
        .await
        .unwrap();
    assert_eq!(response.captions.len(), 3);
}

#[tokio::test]
async fn test_store_outage_fails_closed() {
    let h = harness(&test_config(1), ScriptedBackend::new());
    h.store
        .inject_error(StoreError::Unavailable("connection refused".to_string()))
        .await;

    let err = h
        .service
        .generate(&request(
            Identity::anonymous("1.2.3.4"),
            "https://img.example/a.jpg",
            "funny",
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, CaptionError::StoreUnavailable(_)));
    assert_eq!(err.error_kind(), "capacity_exhausted");
    assert_eq!(err.status_code(), 503);
    assert_eq!(h.backend.calls(), 0);
}

#[tokio::test]
async fn test_store_outage_fails_open_when_configured() {
    let mut config = test_config(1);
    config.service.fail_open_on_store_error = true;
    let h = harness(&config, ScriptedBackend::new());
    h.store
        .inject_error(StoreError::Unavailable("connection refused".to_string()))
        .await;

    let response = h
        .service
        .generate(&request(
            Identity::anonymous("1.2.3.4"),
            "https://img.example/a.jpg",
            "funny",
        ))
        .await
        .unwrap();
    assert!(!response.from_cache);
    assert_eq!(response.remaining_quota, None);
    assert_eq!(h.backend.calls(), 1);
}

#[tokio::test]
async fn test_failed_generation_keeps_quota_by_default() {
    let h = harness(&test_config(1), ScriptedBackend::new());
    h.backend.push(Err(BackendError::Upstream {
        status: 500,
        message: "boom".to_string(),
    }));

    let err = h
        .service
        .generate(&request(
            Identity::anonymous("1.2.3.4"),
            "https://img.example/a.jpg",
            "funny",
        ))
        .await
        .unwrap_err();
    assert_eq!(err.error_kind(), "generation_failed");
    assert_eq!(h.service.quota_remaining("anon:1.2.3.4").await.unwrap().used, 1);
    // Upstream errors do not touch the credential
    assert_eq!(h.service.pool().status().active, 1);
}

#[tokio::test]
async fn test_failed_generation_refunds_when_configured() {
    let mut config = test_config(1);
    config.service.refund_on_generation_failure = true;
    let h = harness(&config, ScriptedBackend::new());
    h.backend.push(Err(BackendError::Transport("reset".to_string())));

    h.service
        .generate(&request(
            Identity::anonymous("1.2.3.4"),
            "https://img.example/a.jpg",
            "funny",
        ))
        .await
        .unwrap_err();
    assert_eq!(h.service.quota_remaining("anon:1.2.3.4").await.unwrap().used, 0);
}

#[tokio::test]
async fn test_blocked_ip_is_rejected_before_quota() {
    let h = harness(&test_config(1), ScriptedBackend::new());
    h.service
        .blocklist()
        .block(
            &BlockTarget::ip("1.2.3.4"),
            BlockReason::Manual,
            Some("operator".to_string()),
        )
        .await
        .unwrap();

    let err = h
        .service
        .generate(&request(
            Identity::anonymous("1.2.3.4"),
            "https://img.example/a.jpg",
            "funny",
        ))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CaptionError::Blocked {
            hours_remaining: 24,
            category: "policy".to_string(),
        }
    );
    assert_eq!(err.status_code(), 403);
    assert_eq!(h.service.quota_remaining("1.2.3.4").await.unwrap().used, 0);
    assert_eq!(h.backend.calls(), 0);
}

#[tokio::test]
async fn test_churned_email_is_blocked_from_any_ip() {
    let h = harness(&test_config(1), ScriptedBackend::new());
    h.service
        .abuse()
        .on_account_deleted("Churn@Example.com", "5.5.5.5")
        .await
        .unwrap();

    let identity = Identity::user("u-new", "6.6.6.6").with_email("churn@example.com");
    let err = h
        .service
        .generate(&request(identity, "https://img.example/a.jpg", "funny"))
        .await
        .unwrap_err();
    assert_eq!(err.error_kind(), "blocked");
    assert_eq!(err.hours_remaining(), Some(24));
    assert!(err.to_string().contains("account_activity"));
}

#[tokio::test]
async fn test_burst_limit_precedes_everything() {
    let mut config = test_config(1);
    config.burst.max_requests = 2;
    let h = harness(&config, ScriptedBackend::new());
    let anon = Identity::anonymous("1.2.3.4");

    for i in 0..2 {
        let url = format!("https://img.example/{}.jpg", i);
        h.service.generate(&request(anon.clone(), &url, "funny")).await.unwrap();
    }
    let err = h
        .service
        .generate(&request(anon, "https://img.example/2.jpg", "funny"))
        .await
        .unwrap_err();
    match err {
        CaptionError::RateLimited { retry_after_secs } => {
            assert!((1..=60).contains(&retry_after_secs))
        }
        other => panic!("expected rate_limited, got {:?}", other),
    }
    assert_eq!(h.service.quota_remaining("1.2.3.4").await.unwrap().used, 2);
}

#[tokio::test]
async fn test_invalid_input_consumes_nothing() {
    let h = harness(&test_config(1), ScriptedBackend::new());
    let err = h
        .service
        .generate(&request(
            Identity::anonymous("1.2.3.4"),
            "ftp://img.example/a.jpg",
            "funny",
        ))
        .await
        .unwrap_err();
    assert_eq!(err.error_kind(), "invalid_input");
    assert_eq!(err.status_code(), 400);
    assert_eq!(h.service.quota_remaining("1.2.3.4").await.unwrap().used, 0);
    assert_eq!(h.service.burst().tracked(), 0);
}

#[tokio::test]
async fn test_maintenance_pass_purges_expired_state() {
    let h = harness(&test_config(1), ScriptedBackend::new());
    let long_ago = Utc::now() - ChronoDuration::days(3);
    h.service
        .blocklist()
        .block_at(&BlockTarget::ip("7.7.7.7"), BlockReason::Manual, None, long_ago)
        .await
        .unwrap();
    h.service
        .blocklist()
        .block(&BlockTarget::ip("8.8.8.8"), BlockReason::Manual, None)
        .await
        .unwrap();

    h.service
        .generate(&request(
            Identity::anonymous("1.2.3.4"),
            "https://img.example/a.jpg",
            "funny",
        ))
        .await
        .unwrap();
    wait_for_cache_entries(&h.store, 1).await;

    let task = MaintenanceTask::new(h.service.clone(), MaintenanceConfig::default());
    let later = Instant::now() + Duration::from_secs(3600);
    let report = task.run_once_at(Utc::now() + ChronoDuration::days(45), later).await;

    assert_eq!(report.burst_entries_swept, 1);
    // Both blocks are expired 45 days from now
    assert_eq!(report.blocks_purged, 2);
    assert_eq!(report.cache_entries_purged, 1);
    assert!(report.flushed);
    assert_eq!(h.store.count_cache_entries().await.unwrap(), 0);
}
