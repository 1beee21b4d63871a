// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Content-addressed caption cache
//!
//! Keys are fingerprints of the normalized request, so a repeat of the same
//! image, description and mood is served without calling the backend and
//! without touching quota.

pub mod caption_cache;
pub mod config;
pub mod fingerprint;
pub mod types;

pub use caption_cache::CaptionCache;
pub use config::CacheConfig;
pub use fingerprint::{normalize_description, Fingerprint};
pub use types::{CacheEntry, CacheLookup, CacheStats};
