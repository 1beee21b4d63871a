// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the generation backend

use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL of an OpenAI-compatible API
    pub endpoint: String,
    pub model: String,
    /// Upper bound on one backend call, enforced by the orchestrator
    pub timeout_ms: u64,
    /// Captions returned per request
    pub captions_per_request: usize,
}

impl GenerationConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: env::var("CAPTION_BACKEND_URL").unwrap_or(defaults.endpoint),
            model: env::var("CAPTION_BACKEND_MODEL").unwrap_or(defaults.model),
            timeout_ms: env::var("CAPTION_BACKEND_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_ms),
            captions_per_request: defaults.captions_per_request,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        let parsed = url::Url::parse(&self.endpoint)
            .map_err(|e| format!("Invalid backend endpoint '{}': {}", self.endpoint, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(format!(
                "Backend endpoint must be http or https, got {}",
                parsed.scheme()
            ));
        }
        if self.model.trim().is_empty() {
            return Err("Backend model must not be empty".to_string());
        }
        if self.timeout_ms == 0 {
            return Err("Backend timeout must be greater than 0".to_string());
        }
        if self.captions_per_request == 0 {
            return Err("Captions per request must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_ms: 30_000,
            captions_per_request: 3,
        }
    }
}
