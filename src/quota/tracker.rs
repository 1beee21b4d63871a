// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tiered quota enforcement over the persistent store

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use super::config::QuotaConfig;
use super::types::{QuotaDecision, QuotaReservation, QuotaSnapshot, QuotaTier};
use crate::store::{PersistentStore, StoreError};

/// Enforces per-identity generation limits for the anonymous and
/// authenticated tiers
pub struct QuotaTracker {
    store: Arc<dyn PersistentStore>,
    config: QuotaConfig,
}

impl QuotaTracker {
    pub fn new(store: Arc<dyn PersistentStore>, config: QuotaConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    /// Take one generation slot for `identity` if the tier allows it
    pub async fn check_and_reserve(
        &self,
        identity: &str,
        tier: QuotaTier,
    ) -> Result<QuotaDecision, StoreError> {
        self.check_and_reserve_at(identity, tier, Utc::now()).await
    }

    pub async fn check_and_reserve_at(
        &self,
        identity: &str,
        tier: QuotaTier,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision, StoreError> {
        let policy = self.config.policy(tier);
        let fresh = policy.period.window_starting(now);

        let reservation = self
            .store
            .reserve_quota(identity, fresh, policy.max_requests, now)
            .await?;

        match reservation {
            QuotaReservation::Reserved { consumed, window } => {
                let remaining = policy.max_requests.saturating_sub(consumed);
                debug!(
                    "Quota reserved for {} ({}): {}/{} used",
                    identity,
                    tier.as_str(),
                    consumed,
                    policy.max_requests
                );
                Ok(QuotaDecision::Allowed {
                    remaining,
                    period_start: window.start,
                    reset_at: window.end,
                })
            }
            QuotaReservation::Denied { window, .. } => {
                info!(
                    "Quota exhausted for {} ({} tier), resets at {}",
                    identity,
                    tier.as_str(),
                    window.end
                );
                Ok(QuotaDecision::Denied {
                    tier,
                    reset_at: window.end,
                })
            }
        }
    }

    /// Return a previously reserved slot if the period has not rolled over
    pub async fn refund(
        &self,
        identity: &str,
        period_start: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let released = self.store.release_quota(identity, period_start).await?;
        if released {
            debug!("Refunded one quota slot to {}", identity);
        }
        Ok(released)
    }

    /// Start of the identity's current period, if it has a live record
    pub async fn current_period_start(
        &self,
        identity: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .store
            .get_quota(identity)
            .await?
            .map(|record| record.period_start))
    }

    /// Read-only view of the identity's remaining quota
    pub async fn remaining(
        &self,
        identity: &str,
        tier: QuotaTier,
    ) -> Result<QuotaSnapshot, StoreError> {
        self.remaining_at(identity, tier, Utc::now()).await
    }

    pub async fn remaining_at(
        &self,
        identity: &str,
        tier: QuotaTier,
        now: DateTime<Utc>,
    ) -> Result<QuotaSnapshot, StoreError> {
        let limit = self.config.policy(tier).max_requests;
        let live = self
            .store
            .get_quota(identity)
            .await?
            .filter(|record| now < record.period_end);

        let (used, reset_at) = match live {
            Some(record) => (record.consumed.min(limit), Some(record.period_end)),
            None => (0, None),
        };

        Ok(QuotaSnapshot {
            identity: identity.to_string(),
            tier,
            limit,
            used,
            remaining: limit - used,
            reset_at,
        })
    }
}
