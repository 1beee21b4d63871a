// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Blocklist and abuse policy tests

use caption_gate::{
    blocklist::{AbuseMonitor, BlockReason, BlockStatus, BlockTarget, Blocklist, BlocklistConfig},
    store::{MemoryStore, PersistentStore},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use std::time::Instant;

fn blocklist() -> Arc<Blocklist> {
    let store: Arc<dyn PersistentStore> = Arc::new(MemoryStore::new());
    Arc::new(Blocklist::new(store, BlocklistConfig::default()))
}

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 14, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn test_block_expires_by_itself() {
    let list = blocklist();
    let target = BlockTarget::email("Spammer@Example.com");
    list.block_at(&target, BlockReason::AccountChurn, None, noon())
        .await
        .unwrap();

    match list
        .is_blocked_at(&BlockTarget::email("spammer@example.com"), noon() + Duration::minutes(30))
        .await
        .unwrap()
    {
        BlockStatus::Blocked {
            hours_remaining,
            reason,
            ..
        } => {
            assert_eq!(hours_remaining, 24);
            assert_eq!(reason, BlockReason::AccountChurn);
        }
        other => panic!("expected block, got {:?}", other),
    }

    // Expired entries read as not blocked before any sweep runs
    assert_eq!(
        list.is_blocked_at(&target, noon() + Duration::hours(24))
            .await
            .unwrap(),
        BlockStatus::NotBlocked
    );
    assert_eq!(list.purge_expired_at(noon() + Duration::hours(24)).await.unwrap(), 1);
}

#[tokio::test]
async fn test_reblocking_extends_and_counts() {
    let list = blocklist();
    let target = BlockTarget::ip("10.0.0.1");

    list.block_at(&target, BlockReason::ResetFlooding, None, noon())
        .await
        .unwrap();
    let entry = list
        .block_at(
            &target,
            BlockReason::ResetFlooding,
            None,
            noon() + Duration::hours(2),
        )
        .await
        .unwrap();
    assert_eq!(entry.attempts, 2);
    assert_eq!(entry.blocked_until, noon() + Duration::hours(8));

    // A shorter block never pulls the expiry earlier
    let entry = list
        .block_for_at(
            &target,
            BlockReason::Manual,
            Duration::minutes(5),
            None,
            noon() + Duration::hours(3),
        )
        .await
        .unwrap();
    assert_eq!(entry.blocked_until, noon() + Duration::hours(8));
}

#[tokio::test]
async fn test_unblock_and_listing() {
    let list = blocklist();
    list.block_at(&BlockTarget::ip("1.1.1.1"), BlockReason::Manual, None, noon())
        .await
        .unwrap();
    list.block_at(
        &BlockTarget::ip("2.2.2.2"),
        BlockReason::ResetFlooding,
        None,
        noon(),
    )
    .await
    .unwrap();

    let entries = list.active_entries_at(noon()).await.unwrap();
    let keys: Vec<&str> = entries.iter().map(|e| e.identity.as_str()).collect();
    assert_eq!(keys, vec!["ip:2.2.2.2", "ip:1.1.1.1"]);

    assert!(list.unblock(&BlockTarget::ip("ip:1.1.1.1")).await.unwrap());
    assert!(!list.unblock(&BlockTarget::ip("1.1.1.1")).await.unwrap());
    assert_eq!(list.active_entries_at(noon()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_deleted_account_cannot_reregister() {
    let monitor = AbuseMonitor::new(blocklist());
    monitor
        .on_account_deleted_at("churn@example.com", "3.3.3.3", noon())
        .await
        .unwrap();

    let status = monitor
        .check_registration_at("CHURN@example.com", "4.4.4.4", noon() + Duration::hours(1))
        .await
        .unwrap();
    assert!(status.is_blocked());

    let status = monitor
        .check_registration_at("other@example.com", "3.3.3.3", noon() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(status, BlockStatus::NotBlocked);
}

#[tokio::test]
async fn test_password_reset_flooding_blocks_email() {
    let monitor = AbuseMonitor::new(blocklist());
    let clock = Instant::now();

    // Three resets per email per hour are allowed, from different IPs
    for i in 0..3 {
        let ip = format!("5.5.5.{}", i);
        let status = monitor
            .on_password_reset_requested_at("victim@example.com", &ip, noon(), clock)
            .await
            .unwrap();
        assert_eq!(status, BlockStatus::NotBlocked);
    }

    match monitor
        .on_password_reset_requested_at("victim@example.com", "5.5.5.9", noon(), clock)
        .await
        .unwrap()
    {
        BlockStatus::Blocked {
            reason,
            hours_remaining,
            ..
        } => {
            assert_eq!(reason, BlockReason::ResetFlooding);
            assert_eq!(hours_remaining, 6);
        }
        other => panic!("expected block, got {:?}", other),
    }

    assert!(monitor
        .blocklist()
        .is_blocked_at(&BlockTarget::email("victim@example.com"), noon())
        .await
        .unwrap()
        .is_blocked());
}

#[tokio::test]
async fn test_password_reset_flooding_blocks_ip() {
    let monitor = AbuseMonitor::new(blocklist());
    let clock = Instant::now();

    for i in 0..5 {
        let email = format!("user{}@example.com", i);
        assert!(!monitor
            .on_password_reset_requested_at(&email, "6.6.6.6", noon(), clock)
            .await
            .unwrap()
            .is_blocked());
    }

    assert!(monitor
        .on_password_reset_requested_at("user9@example.com", "6.6.6.6", noon(), clock)
        .await
        .unwrap()
        .is_blocked());
    assert!(monitor
        .blocklist()
        .is_blocked_at(&BlockTarget::ip("6.6.6.6"), noon())
        .await
        .unwrap()
        .is_blocked());
}
