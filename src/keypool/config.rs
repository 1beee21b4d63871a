// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Key pool configuration

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fmt;

use super::types::mask_secret;

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyPoolConfig {
    /// API secrets, loaded once at startup
    pub keys: Vec<String>,
    /// Minimum gap between two uses of the same credential
    pub min_spacing_ms: u64,
    /// Requests allowed per UTC day across the whole pool
    pub daily_budget: u64,
    /// Cooldown applied when the backend rate-limits a credential without
    /// a Retry-After hint
    pub rate_limit_cooldown_secs: u64,
}

/// Split a comma or newline separated key list
pub fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

impl KeyPoolConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            keys: env::var("CAPTION_API_KEYS")
                .map(|v| parse_key_list(&v))
                .unwrap_or_default(),
            min_spacing_ms: env::var("KEYPOOL_MIN_SPACING_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.min_spacing_ms),
            daily_budget: env::var("KEYPOOL_DAILY_BUDGET")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.daily_budget),
            rate_limit_cooldown_secs: env::var("KEYPOOL_RATE_LIMIT_COOLDOWN_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.rate_limit_cooldown_secs),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.keys.is_empty() {
            return Err("At least one API key is required (CAPTION_API_KEYS)".to_string());
        }
        let unique: HashSet<&String> = self.keys.iter().collect();
        if unique.len() != self.keys.len() {
            return Err("API keys must be unique".to_string());
        }
        if self.daily_budget == 0 {
            return Err("Daily budget must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for KeyPoolConfig {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            min_spacing_ms: 3000,
            daily_budget: 1000,
            rate_limit_cooldown_secs: 65,
        }
    }
}

impl fmt::Debug for KeyPoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked: Vec<String> = self.keys.iter().map(|k| mask_secret(k)).collect();
        f.debug_struct("KeyPoolConfig")
            .field("keys", &masked)
            .field("min_spacing_ms", &self.min_spacing_ms)
            .field("daily_budget", &self.daily_budget)
            .field("rate_limit_cooldown_secs", &self.rate_limit_cooldown_secs)
            .finish()
    }
}
