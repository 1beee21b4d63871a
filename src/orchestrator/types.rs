// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request, response and error types for caption generation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blocklist::BlockTarget;
use crate::quota::QuotaTier;

pub const MAX_URL_LEN: usize = 2048;
pub const MAX_MOOD_LEN: usize = 32;
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Who is asking: a signed-in user or an anonymous IP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub ip_address: String,
    /// Account email, when known; checked against the blocklist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Identity {
    pub fn anonymous(ip_address: impl Into<String>) -> Self {
        Self {
            user_id: None,
            ip_address: ip_address.into(),
            email: None,
        }
    }

    pub fn user(user_id: impl Into<String>, ip_address: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ip_address: ip_address.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    fn user_id(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn tier(&self) -> QuotaTier {
        if self.user_id().is_some() {
            QuotaTier::Authenticated
        } else {
            QuotaTier::Anonymous
        }
    }

    /// Key used for quota and burst accounting
    pub fn quota_key(&self) -> String {
        match self.user_id() {
            Some(id) => format!("user:{}", id),
            None => format!("anon:{}", self.ip_address.trim()),
        }
    }

    /// Blocklist keys to check: the IP always, the email when known
    pub fn block_targets(&self) -> Vec<BlockTarget> {
        let mut targets = vec![BlockTarget::ip(&self.ip_address)];
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            targets.push(BlockTarget::email(email));
        }
        targets
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionRequest {
    pub identity: Identity,
    pub image: ImageDescriptor,
    pub mood: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CaptionRequest {
    pub fn validate(&self) -> Result<(), CaptionError> {
        if self.identity.ip_address.trim().is_empty() {
            return Err(CaptionError::InvalidInput(
                "identity.ipAddress must not be empty".to_string(),
            ));
        }

        let url = self.image.url.trim();
        if url.is_empty() {
            return Err(CaptionError::InvalidInput(
                "image.url must not be empty".to_string(),
            ));
        }
        if url.len() > MAX_URL_LEN {
            return Err(CaptionError::InvalidInput(format!(
                "image.url must be at most {} characters",
                MAX_URL_LEN
            )));
        }
        let parsed = url::Url::parse(url)
            .map_err(|e| CaptionError::InvalidInput(format!("image.url is not a valid URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CaptionError::InvalidInput(
                "image.url must use http or https".to_string(),
            ));
        }

        let mood_len = self.mood.trim().chars().count();
        if mood_len == 0 || mood_len > MAX_MOOD_LEN {
            return Err(CaptionError::InvalidInput(format!(
                "mood must be 1 to {} characters",
                MAX_MOOD_LEN
            )));
        }

        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(CaptionError::InvalidInput(format!(
                    "description must be at most {} characters",
                    MAX_DESCRIPTION_LEN
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionResponse {
    pub captions: Vec<String>,
    pub from_cache: bool,
    /// Quota left after this request; absent for cache hits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_quota: Option<u32>,
}

/// Classified failure of a caption request
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptionError {
    #[error("Too many requests, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Access temporarily blocked ({category}), {hours_remaining}h remaining")]
    Blocked {
        hours_remaining: u64,
        category: String,
    },

    #[error("Quota exceeded for {} tier, resets at {reset_at}", .tier.as_str())]
    QuotaExceeded {
        tier: QuotaTier,
        reset_at: DateTime<Utc>,
        retry_after_secs: u64,
    },

    #[error("Caption capacity exhausted: {reason}")]
    CapacityExhausted {
        reason: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Persistent store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Caption generation failed: {0}")]
    GenerationFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CaptionError {
    /// Machine-readable kind reported to callers
    pub fn error_kind(&self) -> &'static str {
        match self {
            CaptionError::RateLimited { .. } => "rate_limited",
            CaptionError::Blocked { .. } => "blocked",
            CaptionError::QuotaExceeded { .. } => "quota_exceeded",
            CaptionError::CapacityExhausted { .. } | CaptionError::StoreUnavailable(_) => {
                "capacity_exhausted"
            }
            CaptionError::GenerationFailed(_) => "generation_failed",
            CaptionError::InvalidInput(_) => "invalid_input",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            CaptionError::RateLimited { .. } | CaptionError::QuotaExceeded { .. } => 429,
            CaptionError::Blocked { .. } => 403,
            CaptionError::CapacityExhausted { .. } | CaptionError::StoreUnavailable(_) => 503,
            CaptionError::GenerationFailed(_) => 502,
            CaptionError::InvalidInput(_) => 400,
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            CaptionError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            CaptionError::QuotaExceeded {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            CaptionError::CapacityExhausted {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }

    pub fn hours_remaining(&self) -> Option<u64> {
        match self {
            CaptionError::Blocked {
                hours_remaining, ..
            } => Some(*hours_remaining),
            _ => None,
        }
    }
}
