// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Key pool types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Mask a secret down to its last four characters
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

/// One external-API secret in the rotating pool
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    id: String,
    secret: String,
}

impl Credential {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn masked(&self) -> String {
        mask_secret(&self.secret)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("secret", &self.masked())
            .finish()
    }
}

/// A credential handed out by `KeyPool::acquire`
#[derive(Debug, Clone)]
pub struct CredentialLease {
    pub credential: Credential,
    pub leased_at: DateTime<Utc>,
}

impl CredentialLease {
    pub fn id(&self) -> &str {
        self.credential.id()
    }

    pub fn secret(&self) -> &str {
        self.credential.secret()
    }
}

/// Why no credential could be handed out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exhaustion {
    /// The shared daily budget is spent
    DailyBudget { resets_at: DateTime<Utc> },
    /// Every active credential is spacing out or cooling down
    Cooldown { retry_after: Duration },
    /// Every credential has been deactivated
    NoActiveCredentials,
}

impl Exhaustion {
    /// Seconds until a retry can succeed, when known
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        match self {
            Exhaustion::DailyBudget { resets_at } => {
                Some((*resets_at - now).num_seconds().max(1) as u64)
            }
            Exhaustion::Cooldown { retry_after } => {
                Some(retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0))
            }
            Exhaustion::NoActiveCredentials => None,
        }
    }
}

impl fmt::Display for Exhaustion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exhaustion::DailyBudget { resets_at } => {
                write!(f, "daily budget spent, resets at {}", resets_at)
            }
            Exhaustion::Cooldown { retry_after } => {
                write!(f, "all credentials cooling down for {:?}", retry_after)
            }
            Exhaustion::NoActiveCredentials => f.write_str("no active credentials"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyPoolError {
    #[error("Credential pool exhausted: {0}")]
    Exhausted(Exhaustion),
    #[error("Unknown credential: {0}")]
    UnknownCredential(String),
    #[error("Invalid key pool configuration: {0}")]
    InvalidConfig(String),
}

/// Per-credential view for the admin surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    pub id: String,
    pub masked_secret: String,
    pub is_active: bool,
    pub request_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<DateTime<Utc>>,
}

/// Pool-wide aggregate for the admin surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatus {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub cooling_down: usize,
    pub daily_used: u64,
    pub daily_budget: u64,
    pub daily_reset_date: NaiveDate,
    pub credentials: Vec<CredentialStatus>,
}
