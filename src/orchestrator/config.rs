// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Orchestrator and maintenance configuration

use serde::{Deserialize, Serialize};
use std::env;

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Skip block and quota checks when the store is down instead of
    /// rejecting the request
    pub fail_open_on_store_error: bool,
    /// Give the quota slot back when generation fails after reservation
    pub refund_on_generation_failure: bool,
}

impl ServiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            fail_open_on_store_error: env_flag("CAPTION_FAIL_OPEN_ON_STORE_ERROR", false),
            refund_on_generation_failure: env_flag("CAPTION_REFUND_ON_FAILURE", false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Seconds between cleanup runs
    pub interval_secs: u64,
    /// Purge cache entries older than the cache's max age on each run
    pub purge_cache: bool,
}

impl MaintenanceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            interval_secs: env::var("MAINTENANCE_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            purge_cache: env_flag("MAINTENANCE_PURGE_CACHE", true),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_secs == 0 {
            return Err("Maintenance interval must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            purge_cache: true,
        }
    }
}
