// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Generation orchestrator: the seam between in-process limits and durable
//! quota, block and cache state

pub mod admin;
pub mod config;
pub mod maintenance;
pub mod service;
pub mod types;

pub use admin::{normalize_quota_key, AdminError, AdminSnapshot};
pub use config::{MaintenanceConfig, ServiceConfig};
pub use maintenance::{MaintenanceReport, MaintenanceTask};
pub use service::CaptionService;
pub use types::{
    CaptionError, CaptionRequest, CaptionResponse, Identity, ImageDescriptor, MAX_DESCRIPTION_LEN,
    MAX_MOOD_LEN, MAX_URL_LEN,
};
