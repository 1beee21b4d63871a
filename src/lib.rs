// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod blocklist;
pub mod cache;
pub mod cli;
pub mod config;
pub mod generation;
pub mod keypool;
pub mod limiter;
pub mod monitoring;
pub mod orchestrator;
pub mod quota;
pub mod store;
pub mod version;

// Re-export the types most callers need
pub use config::GateConfig;
pub use orchestrator::{
    CaptionError, CaptionRequest, CaptionResponse, CaptionService, Identity, ImageDescriptor,
};
pub use store::{MemoryStore, PersistentStore};
