// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Persistent store trait definition

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::blocklist::{BlockEntry, BlockReason};
use crate::cache::CacheEntry;
use crate::quota::{PeriodWindow, QuotaRecord, QuotaReservation};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("I/O error: {0}")]
    Io(String),
}

/// Durable state shared by the quota tracker, blocklist and caption cache.
///
/// One logical collection per entity. Every mutating method is a single
/// atomic operation at the store; callers never read-modify-write across two
/// calls, so concurrent requests for the same identity cannot both take the
/// last quota slot.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Increment the identity's counter if it is below `limit`.
    ///
    /// When no record exists, or the stored period has ended at `now`, the
    /// record is reset in place to `fresh` with zero consumption before the
    /// increment is attempted.
    async fn reserve_quota(
        &self,
        identity: &str,
        fresh: PeriodWindow,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<QuotaReservation, StoreError>;

    /// Give back one slot if the record is still in the period starting at
    /// `period_start`. Returns whether a slot was released.
    async fn release_quota(
        &self,
        identity: &str,
        period_start: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn get_quota(&self, identity: &str) -> Result<Option<QuotaRecord>, StoreError>;

    /// Create or extend a block. `blocked_until` never moves backwards and
    /// `attempts` counts every call.
    async fn upsert_block(
        &self,
        identity: &str,
        blocked_until: DateTime<Utc>,
        reason: BlockReason,
        evidence: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<BlockEntry, StoreError>;

    async fn get_block(&self, identity: &str) -> Result<Option<BlockEntry>, StoreError>;

    async fn delete_block(&self, identity: &str) -> Result<bool, StoreError>;

    /// Entries with `blocked_until > now`
    async fn list_active_blocks(&self, now: DateTime<Utc>) -> Result<Vec<BlockEntry>, StoreError>;

    /// TTL sweep: drop entries with `blocked_until <= now`
    async fn purge_expired_blocks(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    async fn get_cache_entry(&self, fingerprint: &str) -> Result<Option<CacheEntry>, StoreError>;

    /// Insert unless an entry with the same fingerprint exists. Returns
    /// whether the entry was written.
    async fn insert_cache_entry(&self, entry: CacheEntry) -> Result<bool, StoreError>;

    async fn record_cache_hit(&self, fingerprint: &str, now: DateTime<Utc>)
        -> Result<(), StoreError>;

    /// Delete entries created before `cutoff`
    async fn purge_cache_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    async fn count_cache_entries(&self) -> Result<usize, StoreError>;

    /// Make buffered state durable. No-op for stores that write through.
    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
