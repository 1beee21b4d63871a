// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption cache types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable cache record. `captions` is written once and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub fingerprint: String,
    pub captions: Vec<String>,
    pub hit_count: u64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_hit_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_user_id: Option<String>,
}

/// Result of a cache lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(Vec<String>),
    Miss,
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Entries currently stored
    pub entries: usize,
    /// Lookups served from cache since start
    pub hits: u64,
    /// Lookups that fell through since start
    pub misses: u64,
    /// hits / (hits + misses), 0.0 before the first lookup
    pub hit_rate: f64,
}
