// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption cache over the persistent store

use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::CacheConfig;
use super::fingerprint::Fingerprint;
use super::types::{CacheEntry, CacheLookup, CacheStats};
use crate::store::{PersistentStore, StoreError};

/// Maps request fingerprints to previously generated captions.
///
/// Lookups are read-only. Writes are insert-once, so concurrent stores of the
/// same fingerprint are harmless.
pub struct CaptionCache {
    store: Arc<dyn PersistentStore>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CaptionCache {
    pub fn new(store: Arc<dyn PersistentStore>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up captions for `fingerprint`.
    ///
    /// Store errors degrade to a miss. On a hit the entry's hit counter is
    /// bumped in the background.
    pub async fn lookup(&self, fingerprint: &Fingerprint) -> CacheLookup {
        if !self.config.enabled {
            return CacheLookup::Miss;
        }

        match self.store.get_cache_entry(fingerprint.as_str()).await {
            Ok(Some(entry)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for {} ({} prior hits)", fingerprint, entry.hit_count);
                self.spawn_record_hit(fingerprint.clone());
                CacheLookup::Hit(entry.captions)
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                CacheLookup::Miss
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                warn!("Cache lookup failed for {}, treating as miss: {}", fingerprint, e);
                CacheLookup::Miss
            }
        }
    }

    fn spawn_record_hit(&self, fingerprint: Fingerprint) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.record_cache_hit(fingerprint.as_str(), Utc::now()).await {
                warn!("Failed to record cache hit for {}: {}", fingerprint, e);
            }
        });
    }

    /// Persist captions. Returns whether a new entry was written.
    pub async fn store(
        &self,
        fingerprint: &Fingerprint,
        captions: &[String],
        owner_user_id: Option<&str>,
    ) -> Result<bool, StoreError> {
        self.store_at(fingerprint, captions, owner_user_id, Utc::now())
            .await
    }

    pub async fn store_at(
        &self,
        fingerprint: &Fingerprint,
        captions: &[String],
        owner_user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        if !self.config.enabled {
            return Ok(false);
        }
        let entry = CacheEntry {
            fingerprint: fingerprint.as_str().to_string(),
            captions: captions.to_vec(),
            hit_count: 0,
            created_at: now,
            last_hit_at: None,
            owner_user_id: owner_user_id.map(String::from),
        };
        self.store.insert_cache_entry(entry).await
    }

    /// Fire-and-forget store; failures are logged and swallowed
    pub fn spawn_store(
        &self,
        fingerprint: Fingerprint,
        captions: Vec<String>,
        owner_user_id: Option<String>,
    ) -> Option<JoinHandle<()>> {
        if !self.config.enabled {
            return None;
        }
        let store = Arc::clone(&self.store);
        Some(tokio::spawn(async move {
            let entry = CacheEntry {
                fingerprint: fingerprint.as_str().to_string(),
                captions,
                hit_count: 0,
                created_at: Utc::now(),
                last_hit_at: None,
                owner_user_id,
            };
            match store.insert_cache_entry(entry).await {
                Ok(true) => debug!("Cached captions for {}", fingerprint),
                Ok(false) => debug!("Captions for {} already cached", fingerprint),
                Err(e) => warn!("Failed to cache captions for {}: {}", fingerprint, e),
            }
        }))
    }

    /// Delete entries created more than `days` days ago
    pub async fn purge_older_than(&self, days: u32) -> Result<usize, StoreError> {
        self.purge_older_than_at(days, Utc::now()).await
    }

    pub async fn purge_older_than_at(
        &self,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let Some(cutoff) = now.checked_sub_signed(Duration::days(i64::from(days))) else {
            debug!("Purge horizon of {} days predates any entry", days);
            return Ok(0);
        };
        let removed = self.store.purge_cache_before(cutoff).await?;
        if removed > 0 {
            info!("Purged {} cache entries created before {}", removed, cutoff);
        }
        Ok(removed)
    }

    /// Entry count from the store plus in-process hit/miss counters
    pub async fn stats(&self) -> Result<CacheStats, StoreError> {
        let entries = self.store.count_cache_entries().await?;
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };

        Ok(CacheStats {
            entries,
            hits,
            misses,
            hit_rate,
        })
    }
}
