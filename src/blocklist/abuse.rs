// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Abuse policies that decide when to block

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use super::config::BlocklistConfig;
use super::list::Blocklist;
use super::types::{BlockReason, BlockStatus, BlockTarget};
use crate::limiter::BurstLimiter;
use crate::store::StoreError;

/// Higher-level account workflows that call into the blocklist.
///
/// Blocking is never triggered by the generation burst limiter; only these
/// workflows place automatic blocks.
pub struct AbuseMonitor {
    blocklist: Arc<Blocklist>,
    resets_per_ip: BurstLimiter,
    resets_per_email: BurstLimiter,
}

impl AbuseMonitor {
    pub fn new(blocklist: Arc<Blocklist>) -> Self {
        let config: BlocklistConfig = blocklist.config().clone();
        let window = Duration::from_secs(config.reset_window_secs);
        Self {
            blocklist,
            resets_per_ip: BurstLimiter::with_window(config.reset_max_per_ip, window),
            resets_per_email: BurstLimiter::with_window(config.reset_max_per_email, window),
        }
    }

    pub fn blocklist(&self) -> &Arc<Blocklist> {
        &self.blocklist
    }

    /// An account was deleted; keep the same email from registering again
    /// straight away
    pub async fn on_account_deleted(&self, email: &str, ip: &str) -> Result<(), StoreError> {
        self.on_account_deleted_at(email, ip, Utc::now()).await
    }

    pub async fn on_account_deleted_at(
        &self,
        email: &str,
        ip: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let evidence = format!("account deleted from ip {}", ip.trim());
        self.blocklist
            .block_at(
                &BlockTarget::email(email),
                BlockReason::AccountChurn,
                Some(evidence),
                now,
            )
            .await?;
        Ok(())
    }

    /// Gate a registration attempt on both the email and the source IP
    pub async fn check_registration(&self, email: &str, ip: &str) -> Result<BlockStatus, StoreError> {
        self.check_registration_at(email, ip, Utc::now()).await
    }

    pub async fn check_registration_at(
        &self,
        email: &str,
        ip: &str,
        now: DateTime<Utc>,
    ) -> Result<BlockStatus, StoreError> {
        let targets = [BlockTarget::email(email), BlockTarget::ip(ip)];
        self.blocklist.any_blocked_at(&targets, now).await
    }

    /// Count a password-reset request and block the IP or email once it
    /// floods. Returns `Blocked` when the reset must not be issued.
    pub async fn on_password_reset_requested(
        &self,
        email: &str,
        ip: &str,
    ) -> Result<BlockStatus, StoreError> {
        self.on_password_reset_requested_at(email, ip, Utc::now(), Instant::now())
            .await
    }

    /// `now` stamps blocks while `clock` drives the flood counters
    pub async fn on_password_reset_requested_at(
        &self,
        email: &str,
        ip: &str,
        now: DateTime<Utc>,
        clock: Instant,
    ) -> Result<BlockStatus, StoreError> {
        let email_target = BlockTarget::email(email);
        let ip_target = BlockTarget::ip(ip);

        let existing = self
            .blocklist
            .any_blocked_at(&[ip_target.clone(), email_target.clone()], now)
            .await?;
        if existing.is_blocked() {
            return Ok(existing);
        }

        if !self.resets_per_ip.allow_at(&ip_target.key(), clock) {
            warn!("Password reset flooding from {}", ip_target);
            let evidence = format!("reset requests for {}", email_target);
            self.blocklist
                .block_at(&ip_target, BlockReason::ResetFlooding, Some(evidence), now)
                .await?;
            return self.blocklist.is_blocked_at(&ip_target, now).await;
        }

        if !self.resets_per_email.allow_at(&email_target.key(), clock) {
            warn!("Password reset flooding targeting {}", email_target);
            let evidence = format!("last request from {}", ip_target);
            self.blocklist
                .block_at(&email_target, BlockReason::ResetFlooding, Some(evidence), now)
                .await?;
            return self.blocklist.is_blocked_at(&email_target, now).await;
        }

        Ok(BlockStatus::NotBlocked)
    }

    /// Drop idle reset counters
    pub fn sweep(&self) -> usize {
        self.resets_per_ip.sweep_expired() + self.resets_per_email.sweep_expired()
    }
}
