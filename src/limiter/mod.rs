// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Burst control independent of business quotas

pub mod burst;
pub mod config;

pub use burst::{BurstDecision, BurstLimiter};
pub use config::BurstConfig;
