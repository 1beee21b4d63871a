// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for abuse blocking

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;

use super::types::BlockReason;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlocklistConfig {
    /// Block length after delete-and-re-register churn
    pub account_churn_hours: u32,
    /// Block length after password-reset flooding
    pub reset_flooding_hours: u32,
    /// Default length of an operator-placed block
    pub manual_hours: u32,
    /// Reset requests allowed from one IP per window
    pub reset_max_per_ip: u32,
    /// Reset requests allowed to one email per window
    pub reset_max_per_email: u32,
    pub reset_window_secs: u64,
}

impl BlocklistConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            account_churn_hours: env::var("BLOCK_ACCOUNT_CHURN_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.account_churn_hours),
            reset_flooding_hours: env::var("BLOCK_RESET_FLOODING_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.reset_flooding_hours),
            manual_hours: env::var("BLOCK_MANUAL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.manual_hours),
            reset_max_per_ip: env::var("BLOCK_RESET_MAX_PER_IP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.reset_max_per_ip),
            reset_max_per_email: env::var("BLOCK_RESET_MAX_PER_EMAIL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.reset_max_per_email),
            reset_window_secs: env::var("BLOCK_RESET_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.reset_window_secs),
        }
    }

    /// Block duration for a reason
    pub fn duration_for(&self, reason: BlockReason) -> Duration {
        let hours = match reason {
            BlockReason::AccountChurn => self.account_churn_hours,
            BlockReason::ResetFlooding => self.reset_flooding_hours,
            BlockReason::Manual => self.manual_hours,
        };
        Duration::hours(i64::from(hours))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.account_churn_hours == 0
            || self.reset_flooding_hours == 0
            || self.manual_hours == 0
        {
            return Err("Block durations must be at least one hour".to_string());
        }
        if self.reset_max_per_ip == 0 || self.reset_max_per_email == 0 {
            return Err("Reset request limits must be greater than 0".to_string());
        }
        if self.reset_window_secs == 0 {
            return Err("Reset window must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for BlocklistConfig {
    fn default() -> Self {
        Self {
            account_churn_hours: 24,
            reset_flooding_hours: 6,
            manual_hours: 24,
            reset_max_per_ip: 5,
            reset_max_per_email: 3,
            reset_window_secs: 3600,
        }
    }
}
