// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tiered generation quotas
//!
//! Anonymous callers are counted by IP, signed-in callers by user id. Each
//! tier has its own maximum and period. Reservation is a single atomic
//! increment-if-below at the persistent store.

pub mod config;
pub mod period;
pub mod tracker;
pub mod types;

pub use config::QuotaConfig;
pub use period::next_midnight;
pub use tracker::QuotaTracker;
pub use types::{
    denial_guidance, PeriodKind, PeriodWindow, QuotaDecision, QuotaRecord, QuotaReservation,
    QuotaSnapshot, QuotaTier, TierPolicy,
};
