// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Core types for tiered generation quotas

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quota class of a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaTier {
    /// Caller identified only by IP address
    Anonymous,
    /// Signed-in caller identified by user id
    Authenticated,
}

impl QuotaTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaTier::Anonymous => "anonymous",
            QuotaTier::Authenticated => "authenticated",
        }
    }

    /// Infer the tier from a normalized identity key (`user:` or `anon:`)
    pub fn from_identity_key(key: &str) -> Self {
        if key.starts_with("user:") {
            QuotaTier::Authenticated
        } else {
            QuotaTier::Anonymous
        }
    }
}

/// How a tier's accounting period is laid out in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PeriodKind {
    /// UTC calendar month; resets on the 1st at midnight
    CalendarMonth,
    /// UTC calendar day; resets at midnight
    CalendarDay,
    /// Fixed-length period starting at the first request after the previous one ended
    Rolling { seconds: u64 },
}

/// Limits applied to one tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierPolicy {
    /// Generations allowed per period
    pub max_requests: u32,
    pub period: PeriodKind,
}

/// Half-open interval `[start, end)` covered by a quota record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PeriodWindow {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        now >= self.start && now < self.end
    }
}

/// Durable per-identity quota counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaRecord {
    /// Normalized identity key (`anon:<ip>` or `user:<id>`)
    pub identity: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    /// Generations consumed inside the current period
    pub consumed: u32,
    pub updated_at: DateTime<Utc>,
}

impl QuotaRecord {
    pub fn window(&self) -> PeriodWindow {
        PeriodWindow {
            start: self.period_start,
            end: self.period_end,
        }
    }
}

/// Outcome of the store's atomic increment-if-below operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaReservation {
    /// A slot was taken; `consumed` includes it
    Reserved {
        consumed: u32,
        window: PeriodWindow,
    },
    /// No slot left in the current period
    Denied {
        consumed: u32,
        window: PeriodWindow,
    },
}

/// Result of `QuotaTracker::check_and_reserve`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed {
        remaining: u32,
        period_start: DateTime<Utc>,
        reset_at: DateTime<Utc>,
    },
    Denied {
        tier: QuotaTier,
        reset_at: DateTime<Utc>,
    },
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allowed { .. })
    }
}

/// Read-only view of an identity's quota, for the admin surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSnapshot {
    pub identity: String,
    pub tier: QuotaTier,
    pub limit: u32,
    pub used: u32,
    pub remaining: u32,
    /// None when the identity has no record in a live period
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
}

/// User-facing guidance for a denied tier
pub fn denial_guidance(tier: QuotaTier) -> &'static str {
    match tier {
        QuotaTier::Anonymous => "Free caption limit reached. Sign up to get more generations.",
        QuotaTier::Authenticated => {
            "Monthly caption limit reached. Your quota resets at the start of the next period."
        }
    }
}
