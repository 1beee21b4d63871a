// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Core types for caption generation

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the backend is asked to caption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationInput {
    pub image_url: String,
    pub mood: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Errors that can occur during a backend call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend throttled this credential
    #[error("Rate limited by backend, retry after {retry_after_secs:?}s")]
    RateLimited {
        /// Backend's Retry-After hint, when sent
        retry_after_secs: Option<u64>,
    },

    /// The backend refused the credential itself
    #[error("Credential rejected by backend: HTTP {status}")]
    CredentialRejected { status: u16 },

    #[error("Backend timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("Backend error: {status} - {message}")]
    Upstream { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl BackendError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, retry_after_secs: Option<u64>, message: String) -> Self {
        match status {
            429 => BackendError::RateLimited { retry_after_secs },
            401 | 403 => BackendError::CredentialRejected { status },
            _ => BackendError::Upstream { status, message },
        }
    }
}
