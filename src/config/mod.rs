// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration
//!
//! Every component owns its config struct with `Default`, `from_env` and
//! `validate`. `GateConfig` aggregates them and can also be read from a TOML
//! file with the same layout.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

use crate::blocklist::BlocklistConfig;
use crate::cache::CacheConfig;
use crate::generation::GenerationConfig;
use crate::keypool::KeyPoolConfig;
use crate::limiter::BurstConfig;
use crate::orchestrator::{MaintenanceConfig, ServiceConfig};
use crate::quota::QuotaConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Io { path: String, message: String },
    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
    #[error("Invalid {section} configuration: {message}")]
    Invalid { section: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Bearer token for `/admin` routes; admin routes are disabled when unset
    pub admin_token: Option<String>,
    /// Path of the JSON store snapshot; state is memory-only when unset
    pub store_path: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env::var("CAPTION_GATE_BIND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bind_addr),
            admin_token: env::var("CAPTION_ADMIN_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            store_path: env::var("CAPTION_STORE_PATH").ok(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if let Some(token) = &self.admin_token {
            if token.len() < 16 {
                return Err("Admin token must be at least 16 characters".to_string());
            }
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            admin_token: None,
            store_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub server: ServerConfig,
    pub keys: KeyPoolConfig,
    pub burst: BurstConfig,
    pub quota: QuotaConfig,
    pub blocklist: BlocklistConfig,
    pub cache: CacheConfig,
    pub generation: GenerationConfig,
    pub service: ServiceConfig,
    pub maintenance: MaintenanceConfig,
}

impl GateConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            keys: KeyPoolConfig::from_env(),
            burst: BurstConfig::from_env(),
            quota: QuotaConfig::from_env(),
            blocklist: BlocklistConfig::from_env(),
            cache: CacheConfig::from_env(),
            generation: GenerationConfig::from_env(),
            service: ServiceConfig::from_env(),
            maintenance: MaintenanceConfig::from_env(),
        }
    }

    pub fn from_toml_str(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&raw, &path.display().to_string())
    }

    /// `CAPTION_GATE_CONFIG` names a TOML file; otherwise the environment is used
    pub fn load() -> Result<Self, ConfigError> {
        match env::var("CAPTION_GATE_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_toml_file(path.trim()),
            _ => Ok(Self::from_env()),
        }
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |section: &'static str| {
            move |message: String| ConfigError::Invalid { section, message }
        };
        self.server.validate().map_err(invalid("server"))?;
        self.keys.validate().map_err(invalid("keys"))?;
        self.burst.validate().map_err(invalid("burst"))?;
        self.quota.validate().map_err(invalid("quota"))?;
        self.blocklist.validate().map_err(invalid("blocklist"))?;
        self.cache.validate().map_err(invalid("cache"))?;
        self.generation.validate().map_err(invalid("generation"))?;
        self.maintenance.validate().map_err(invalid("maintenance"))?;
        Ok(())
    }
}
