// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Core types for the abuse blocklist

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Why an identity was blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// Account deleted and re-registered in quick succession
    AccountChurn,
    /// Too many password-reset requests from one IP or to one email
    ResetFlooding,
    /// Placed by an operator
    Manual,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::AccountChurn => "account_churn",
            BlockReason::ResetFlooding => "reset_flooding",
            BlockReason::Manual => "manual",
        }
    }

    /// Coarse category shown to users; never the evidence itself
    pub fn category(&self) -> &'static str {
        match self {
            BlockReason::AccountChurn => "account_activity",
            BlockReason::ResetFlooding => "too_many_requests",
            BlockReason::Manual => "policy",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that can be blocked: an email address or an IP address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockTarget {
    Email(String),
    Ip(String),
}

impl BlockTarget {
    pub fn email(email: &str) -> Self {
        BlockTarget::Email(email.trim().to_lowercase())
    }

    pub fn ip(ip: &str) -> Self {
        let ip = ip.trim();
        let ip = ip.strip_prefix("ip:").unwrap_or(ip);
        BlockTarget::Ip(ip.to_lowercase())
    }

    /// Parse an admin-supplied identity: `ip:`-prefixed, an email, or a bare IP
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if raw.starts_with("ip:") {
            return Some(Self::ip(raw));
        }
        if raw.contains('@') {
            return Some(Self::email(raw));
        }
        raw.parse::<IpAddr>().ok().map(|_| Self::ip(raw))
    }

    /// Normalized store key
    pub fn key(&self) -> String {
        match self {
            BlockTarget::Email(email) => email.clone(),
            BlockTarget::Ip(ip) => format!("ip:{}", ip),
        }
    }
}

impl fmt::Display for BlockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Durable block record keyed by normalized identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEntry {
    pub identity: String,
    pub blocked_until: DateTime<Utc>,
    /// Number of times this identity has been blocked while the entry lived
    pub attempts: u32,
    pub reason: BlockReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlockEntry {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.blocked_until
    }
}

/// Result of `Blocklist::is_blocked`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockStatus {
    NotBlocked,
    Blocked {
        until: DateTime<Utc>,
        hours_remaining: u64,
        reason: BlockReason,
    },
}

impl BlockStatus {
    pub fn is_blocked(&self) -> bool {
        matches!(self, BlockStatus::Blocked { .. })
    }
}

/// Whole hours until `until`, rounded up, never below one while blocked
pub fn hours_remaining(until: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let secs = (until - now).num_seconds().max(0) as u64;
    secs.div_ceil(3600).max(1)
}
