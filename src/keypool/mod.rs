// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Rotating pool of external API credentials

pub mod config;
pub mod pool;
pub mod types;

pub use config::{parse_key_list, KeyPoolConfig};
pub use pool::{KeyPool, MAX_COOLDOWN_SECS};
pub use types::{
    mask_secret, Credential, CredentialLease, CredentialStatus, Exhaustion, KeyPoolError,
    PoolStatus,
};
