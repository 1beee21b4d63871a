// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the burst limiter

use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurstConfig {
    /// Requests allowed per identity per window
    pub max_requests: u32,
    /// Window length in seconds
    pub window_secs: u64,
    /// How long expired entries linger before the sweep removes them
    pub grace_secs: u64,
}

impl BurstConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            max_requests: env::var("BURST_MAX_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            window_secs: env::var("BURST_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            grace_secs: env::var("BURST_GRACE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_requests == 0 {
            return Err("Burst cap must be greater than 0".to_string());
        }
        if self.window_secs == 0 {
            return Err("Burst window must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_secs: 60,
            grace_secs: 60,
        }
    }
}
