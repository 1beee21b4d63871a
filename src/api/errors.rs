// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::keypool::KeyPoolError;
use crate::orchestrator::{AdminError, CaptionError};
use crate::quota::denial_guidance;
use crate::store::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours_remaining: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    Caption(CaptionError),
    NotFound(String),
    InvalidRequest(String),
    Unauthorized(String),
    ServiceUnavailable(String),
    InternalError(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        let mut response = ErrorResponse {
            error_kind: self.error_kind().to_string(),
            message: self.message(),
            retry_after_seconds: self.retry_after_secs(),
            hours_remaining: None,
            reset_at: None,
            tier: None,
        };

        if let ApiError::Caption(error) = self {
            response.hours_remaining = error.hours_remaining();
            if let CaptionError::QuotaExceeded { tier, reset_at, .. } = error {
                response.reset_at = Some(*reset_at);
                response.tier = Some(tier.as_str().to_string());
            }
        }
        response
    }

    pub fn error_kind(&self) -> &'static str {
        match self {
            ApiError::Caption(e) => e.error_kind(),
            ApiError::NotFound(_) => "not_found",
            ApiError::InvalidRequest(_) => "invalid_input",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::InternalError(_) => "internal_error",
        }
    }

    /// User-facing message; block reasons are reduced to their category and
    /// quota denials carry tier-specific guidance
    fn message(&self) -> String {
        match self {
            ApiError::Caption(CaptionError::QuotaExceeded { tier, .. }) => {
                denial_guidance(*tier).to_string()
            }
            ApiError::Caption(CaptionError::StoreUnavailable(_)) => {
                "Caption service is temporarily unavailable".to_string()
            }
            ApiError::Caption(CaptionError::GenerationFailed(_)) => {
                "Caption generation failed, please try again".to_string()
            }
            ApiError::Caption(e) => e.to_string(),
            ApiError::NotFound(msg)
            | ApiError::InvalidRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::ServiceUnavailable(msg)
            | ApiError::InternalError(msg) => msg.clone(),
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            ApiError::Caption(e) => e.retry_after_secs(),
            _ => None,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Caption(e) => e.status_code(),
            ApiError::NotFound(_) => 404,
            ApiError::InvalidRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::InternalError(_) => 500,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Caption(e) => write!(f, "{}", e),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<CaptionError> for ApiError {
    fn from(error: CaptionError) -> Self {
        ApiError::Caption(error)
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        ApiError::ServiceUnavailable(error.to_string())
    }
}

impl From<AdminError> for ApiError {
    fn from(error: AdminError) -> Self {
        match error {
            AdminError::InvalidIdentity(raw) => {
                ApiError::InvalidRequest(format!("Invalid identity '{}'", raw))
            }
            AdminError::KeyPool(KeyPoolError::UnknownCredential(id)) => {
                ApiError::NotFound(format!("Credential '{}' not found", id))
            }
            AdminError::KeyPool(e) => ApiError::InternalError(e.to_string()),
            AdminError::Store(e) => e.into(),
        }
    }
}
