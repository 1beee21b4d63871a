// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Durable temporary bans over the persistent store

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::config::BlocklistConfig;
use super::types::{hours_remaining, BlockEntry, BlockReason, BlockStatus, BlockTarget};
use crate::store::{PersistentStore, StoreError};

pub struct Blocklist {
    store: Arc<dyn PersistentStore>,
    config: BlocklistConfig,
}

impl Blocklist {
    pub fn new(store: Arc<dyn PersistentStore>, config: BlocklistConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &BlocklistConfig {
        &self.config
    }

    /// Block `target` for the configured duration of `reason`
    pub async fn block(
        &self,
        target: &BlockTarget,
        reason: BlockReason,
        evidence: Option<String>,
    ) -> Result<BlockEntry, StoreError> {
        self.block_at(target, reason, evidence, Utc::now()).await
    }

    pub async fn block_at(
        &self,
        target: &BlockTarget,
        reason: BlockReason,
        evidence: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<BlockEntry, StoreError> {
        let duration = self.config.duration_for(reason);
        self.block_for_at(target, reason, duration, evidence, now)
            .await
    }

    /// Block with an explicit duration, used by the admin override
    pub async fn block_for_at(
        &self,
        target: &BlockTarget,
        reason: BlockReason,
        duration: Duration,
        evidence: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<BlockEntry, StoreError> {
        let key = target.key();
        let entry = self
            .store
            .upsert_block(&key, now + duration, reason, evidence, now)
            .await?;

        warn!(
            "Blocked {} until {} (reason: {}, attempts: {})",
            key, entry.blocked_until, reason, entry.attempts
        );
        Ok(entry)
    }

    pub async fn is_blocked(&self, target: &BlockTarget) -> Result<BlockStatus, StoreError> {
        self.is_blocked_at(target, Utc::now()).await
    }

    /// Entries at or past `blocked_until` are treated as absent even before
    /// the TTL sweep removes them
    pub async fn is_blocked_at(
        &self,
        target: &BlockTarget,
        now: DateTime<Utc>,
    ) -> Result<BlockStatus, StoreError> {
        let entry = self.store.get_block(&target.key()).await?;
        Ok(match entry {
            Some(entry) if entry.is_active(now) => BlockStatus::Blocked {
                until: entry.blocked_until,
                hours_remaining: hours_remaining(entry.blocked_until, now),
                reason: entry.reason,
            },
            _ => BlockStatus::NotBlocked,
        })
    }

    /// First active block among `targets`, in order
    pub async fn any_blocked_at(
        &self,
        targets: &[BlockTarget],
        now: DateTime<Utc>,
    ) -> Result<BlockStatus, StoreError> {
        for target in targets {
            let status = self.is_blocked_at(target, now).await?;
            if status.is_blocked() {
                return Ok(status);
            }
        }
        Ok(BlockStatus::NotBlocked)
    }

    /// Administrative override. Returns whether an entry was removed.
    pub async fn unblock(&self, target: &BlockTarget) -> Result<bool, StoreError> {
        let removed = self.store.delete_block(&target.key()).await?;
        if removed {
            info!("Block on {} lifted by administrator", target);
        }
        Ok(removed)
    }

    pub async fn active_entries(&self) -> Result<Vec<BlockEntry>, StoreError> {
        self.active_entries_at(Utc::now()).await
    }

    pub async fn active_entries_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<BlockEntry>, StoreError> {
        let mut entries = self.store.list_active_blocks(now).await?;
        entries.sort_by(|a, b| a.blocked_until.cmp(&b.blocked_until));
        Ok(entries)
    }

    /// TTL sweep
    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.store.purge_expired_blocks(now).await
    }
}
