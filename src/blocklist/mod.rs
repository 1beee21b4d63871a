// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Abuse blocklist
//!
//! Durable, time-limited bans on an email address or an `ip:`-prefixed
//! address. Blocks are placed by explicit abuse policies (`AbuseMonitor`) or by
//! an administrator and expire on their own at `blocked_until`.

pub mod abuse;
pub mod config;
pub mod list;
pub mod types;

pub use abuse::AbuseMonitor;
pub use config::BlocklistConfig;
pub use list::Blocklist;
pub use types::{hours_remaining, BlockEntry, BlockReason, BlockStatus, BlockTarget};
