// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-process document store with optional JSON snapshot persistence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::backend::{PersistentStore, StoreError};
use crate::blocklist::{BlockEntry, BlockReason};
use crate::cache::CacheEntry;
use crate::quota::{PeriodWindow, QuotaRecord, QuotaReservation};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    quotas: Vec<QuotaRecord>,
    #[serde(default)]
    blocks: Vec<BlockEntry>,
    #[serde(default)]
    captions: Vec<CacheEntry>,
}

/// Document store held in memory, one lock per collection.
///
/// Each trait method takes exactly one collection lock for its whole
/// read-modify-write, which gives the same atomic upsert semantics a document
/// database provides with `findOneAndUpdate`.
#[derive(Debug)]
pub struct MemoryStore {
    quotas: RwLock<HashMap<String, QuotaRecord>>,
    blocks: RwLock<HashMap<String, BlockEntry>>,
    captions: RwLock<HashMap<String, CacheEntry>>,
    snapshot_path: Option<PathBuf>,
    injected_error: Mutex<Option<StoreError>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            quotas: RwLock::new(HashMap::new()),
            blocks: RwLock::new(HashMap::new()),
            captions: RwLock::new(HashMap::new()),
            snapshot_path: None,
            injected_error: Mutex::new(None),
        }
    }

    /// Open a store backed by a snapshot file, loading it if it exists
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Snapshot>(&bytes)
                .map_err(|e| StoreError::SerializationError(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };

        info!(
            "Opened store snapshot {}: {} quota records, {} blocks, {} cached captions",
            path.display(),
            snapshot.quotas.len(),
            snapshot.blocks.len(),
            snapshot.captions.len()
        );

        Ok(Self {
            quotas: RwLock::new(
                snapshot
                    .quotas
                    .into_iter()
                    .map(|r| (r.identity.clone(), r))
                    .collect(),
            ),
            blocks: RwLock::new(
                snapshot
                    .blocks
                    .into_iter()
                    .map(|b| (b.identity.clone(), b))
                    .collect(),
            ),
            captions: RwLock::new(
                snapshot
                    .captions
                    .into_iter()
                    .map(|c| (c.fingerprint.clone(), c))
                    .collect(),
            ),
            snapshot_path: Some(path),
            injected_error: Mutex::new(None),
        })
    }

    /// Make every subsequent operation fail with `error` until cleared
    pub async fn inject_error(&self, error: StoreError) {
        *self.injected_error.lock().await = Some(error);
    }

    pub async fn clear_error(&self) {
        *self.injected_error.lock().await = None;
    }

    async fn check_available(&self) -> Result<(), StoreError> {
        match self.injected_error.lock().await.as_ref() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn reserve_quota(
        &self,
        identity: &str,
        fresh: PeriodWindow,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<QuotaReservation, StoreError> {
        self.check_available().await?;
        let mut quotas = self.quotas.write().await;

        let record = quotas
            .entry(identity.to_string())
            .or_insert_with(|| QuotaRecord {
                identity: identity.to_string(),
                period_start: fresh.start,
                period_end: fresh.end,
                consumed: 0,
                updated_at: now,
            });

        if now >= record.period_end {
            debug!("Quota period rolled over for {}", identity);
            record.period_start = fresh.start;
            record.period_end = fresh.end;
            record.consumed = 0;
        }

        let window = record.window();
        if record.consumed < limit {
            record.consumed += 1;
            record.updated_at = now;
            Ok(QuotaReservation::Reserved {
                consumed: record.consumed,
                window,
            })
        } else {
            Ok(QuotaReservation::Denied {
                consumed: record.consumed,
                window,
            })
        }
    }

    async fn release_quota(
        &self,
        identity: &str,
        period_start: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.check_available().await?;
        let mut quotas = self.quotas.write().await;
        match quotas.get_mut(identity) {
            Some(record) if record.period_start == period_start && record.consumed > 0 => {
                record.consumed -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_quota(&self, identity: &str) -> Result<Option<QuotaRecord>, StoreError> {
        self.check_available().await?;
        Ok(self.quotas.read().await.get(identity).cloned())
    }

    async fn upsert_block(
        &self,
        identity: &str,
        blocked_until: DateTime<Utc>,
        reason: BlockReason,
        evidence: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<BlockEntry, StoreError> {
        self.check_available().await?;
        let mut blocks = self.blocks.write().await;

        if let Some(existing) = blocks.get_mut(identity).filter(|b| b.is_active(now)) {
            existing.attempts += 1;
            existing.blocked_until = existing.blocked_until.max(blocked_until);
            existing.reason = reason;
            if evidence.is_some() {
                existing.evidence = evidence;
            }
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let entry = BlockEntry {
            identity: identity.to_string(),
            blocked_until,
            attempts: 1,
            reason,
            evidence,
            created_at: now,
            updated_at: now,
        };
        blocks.insert(identity.to_string(), entry.clone());
        Ok(entry)
    }

    async fn get_block(&self, identity: &str) -> Result<Option<BlockEntry>, StoreError> {
        self.check_available().await?;
        Ok(self.blocks.read().await.get(identity).cloned())
    }

    async fn delete_block(&self, identity: &str) -> Result<bool, StoreError> {
        self.check_available().await?;
        Ok(self.blocks.write().await.remove(identity).is_some())
    }

    async fn list_active_blocks(&self, now: DateTime<Utc>) -> Result<Vec<BlockEntry>, StoreError> {
        self.check_available().await?;
        let blocks = self.blocks.read().await;
        let mut active: Vec<BlockEntry> = blocks
            .values()
            .filter(|b| b.is_active(now))
            .cloned()
            .collect();
        active.sort_by_key(|b| b.blocked_until);
        Ok(active)
    }

    async fn purge_expired_blocks(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.check_available().await?;
        let mut blocks = self.blocks.write().await;
        let before = blocks.len();
        blocks.retain(|_, b| b.is_active(now));
        Ok(before - blocks.len())
    }

    async fn get_cache_entry(&self, fingerprint: &str) -> Result<Option<CacheEntry>, StoreError> {
        self.check_available().await?;
        Ok(self.captions.read().await.get(fingerprint).cloned())
    }

    async fn insert_cache_entry(&self, entry: CacheEntry) -> Result<bool, StoreError> {
        self.check_available().await?;
        let mut captions = self.captions.write().await;
        if captions.contains_key(&entry.fingerprint) {
            return Ok(false);
        }
        captions.insert(entry.fingerprint.clone(), entry);
        Ok(true)
    }

    async fn record_cache_hit(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.check_available().await?;
        if let Some(entry) = self.captions.write().await.get_mut(fingerprint) {
            entry.hit_count += 1;
            entry.last_hit_at = Some(now);
        }
        Ok(())
    }

    async fn purge_cache_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        self.check_available().await?;
        let mut captions = self.captions.write().await;
        let before = captions.len();
        captions.retain(|_, c| c.created_at >= cutoff);
        Ok(before - captions.len())
    }

    async fn count_cache_entries(&self) -> Result<usize, StoreError> {
        self.check_available().await?;
        Ok(self.captions.read().await.len())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let path = match &self.snapshot_path {
            Some(path) => path,
            None => return Ok(()),
        };
        self.check_available().await?;

        // Collections are copied one at a time so a flush never holds more
        // than one lock.
        let snapshot = Snapshot {
            quotas: self.quotas.read().await.values().cloned().collect(),
            blocks: self.blocks.read().await.values().cloned().collect(),
            captions: self.captions.read().await.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;

        debug!("Flushed store snapshot to {}", path.display());
        Ok(())
    }
}
