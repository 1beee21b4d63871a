// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Read-only aggregates and operator actions over the coordinator state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use thiserror::Error;
use tracing::info;

use super::service::CaptionService;
use crate::blocklist::{BlockEntry, BlockTarget};
use crate::cache::CacheStats;
use crate::keypool::{KeyPoolError, PoolStatus};
use crate::quota::{QuotaSnapshot, QuotaTier};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),
    #[error(transparent)]
    KeyPool(#[from] KeyPoolError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSnapshot {
    pub pool: PoolStatus,
    pub cache: CacheStats,
    pub active_blocks: usize,
    pub generated_at: DateTime<Utc>,
}

/// Accept `anon:<ip>`, `user:<id>`, a bare IP or a bare user id
pub fn normalize_quota_key(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(rest) = raw.strip_prefix("anon:").or_else(|| raw.strip_prefix("user:")) {
        return (!rest.trim().is_empty()).then(|| raw.to_string());
    }
    if raw.parse::<IpAddr>().is_ok() {
        Some(format!("anon:{}", raw))
    } else {
        Some(format!("user:{}", raw))
    }
}

impl CaptionService {
    pub async fn admin_snapshot(&self) -> Result<AdminSnapshot, StoreError> {
        let now = Utc::now();
        let cache = self.cache().stats().await?;
        let active_blocks = self.blocklist().active_entries_at(now).await?.len();
        Ok(AdminSnapshot {
            pool: self.pool().status_at(now),
            cache,
            active_blocks,
            generated_at: now,
        })
    }

    pub async fn quota_remaining(&self, identity: &str) -> Result<QuotaSnapshot, AdminError> {
        let key = normalize_quota_key(identity)
            .ok_or_else(|| AdminError::InvalidIdentity(identity.to_string()))?;
        let tier = QuotaTier::from_identity_key(&key);
        Ok(self.quota().remaining(&key, tier).await?)
    }

    pub async fn active_blocks(&self) -> Result<Vec<BlockEntry>, StoreError> {
        self.blocklist().active_entries().await
    }

    /// Lift a block early. Returns whether an entry existed.
    pub async fn unblock(&self, identity: &str) -> Result<bool, AdminError> {
        let target = BlockTarget::parse(identity)
            .ok_or_else(|| AdminError::InvalidIdentity(identity.to_string()))?;
        Ok(self.blocklist().unblock(&target).await?)
    }

    pub fn deactivate_credential(&self, id: &str) -> Result<PoolStatus, AdminError> {
        self.pool().deactivate(id)?;
        Ok(self.pool().status())
    }

    pub fn reactivate_credential(&self, id: &str) -> Result<PoolStatus, AdminError> {
        self.pool().reactivate(id)?;
        Ok(self.pool().status())
    }

    pub fn reactivate_all_credentials(&self) -> PoolStatus {
        self.pool().reactivate_all();
        self.pool().status()
    }

    pub async fn purge_cache(&self, older_than_days: u32) -> Result<usize, StoreError> {
        let purged = self.cache().purge_older_than(older_than_days).await?;
        info!(
            "Admin purge removed {} cache entries older than {} days",
            purged, older_than_days
        );
        Ok(purged)
    }
}
