// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for tiered quotas

use serde::{Deserialize, Serialize};
use std::env;

use super::types::{PeriodKind, QuotaTier, TierPolicy};

/// Per-tier quota limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub anonymous: TierPolicy,
    pub authenticated: TierPolicy,
}

impl QuotaConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            anonymous: TierPolicy {
                max_requests: env::var("QUOTA_ANONYMOUS_MAX")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.anonymous.max_requests),
                period: period_from_env("QUOTA_ANONYMOUS_PERIOD")
                    .unwrap_or(defaults.anonymous.period),
            },
            authenticated: TierPolicy {
                max_requests: env::var("QUOTA_AUTHENTICATED_MAX")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.authenticated.max_requests),
                period: period_from_env("QUOTA_AUTHENTICATED_PERIOD")
                    .unwrap_or(defaults.authenticated.period),
            },
        }
    }

    pub fn policy(&self, tier: QuotaTier) -> TierPolicy {
        match tier {
            QuotaTier::Anonymous => self.anonymous,
            QuotaTier::Authenticated => self.authenticated,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        for (name, policy) in [
            ("anonymous", &self.anonymous),
            ("authenticated", &self.authenticated),
        ] {
            if policy.max_requests == 0 {
                return Err(format!("{} quota must allow at least one request", name));
            }
            if let PeriodKind::Rolling { seconds: 0 } = policy.period {
                return Err(format!("{} rolling period must be longer than 0s", name));
            }
        }
        Ok(())
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            anonymous: TierPolicy {
                max_requests: 5,
                period: PeriodKind::CalendarMonth,
            },
            authenticated: TierPolicy {
                max_requests: 50,
                period: PeriodKind::CalendarMonth,
            },
        }
    }
}

/// Accepts `month`, `day`, or a number of seconds for a rolling period
fn period_from_env(key: &str) -> Option<PeriodKind> {
    let raw = env::var(key).ok()?;
    match raw.trim().to_lowercase().as_str() {
        "month" | "calendar_month" => Some(PeriodKind::CalendarMonth),
        "day" | "calendar_day" => Some(PeriodKind::CalendarDay),
        other => other
            .parse::<u64>()
            .ok()
            .map(|seconds| PeriodKind::Rolling { seconds }),
    }
}
