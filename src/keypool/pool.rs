// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Round-robin credential pool with per-key spacing and a shared daily budget

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::config::KeyPoolConfig;
use super::types::{
    Credential, CredentialLease, CredentialStatus, Exhaustion, KeyPoolError, PoolStatus,
};
use crate::quota::next_midnight;

/// Upper bound on any single cooldown, whatever the backend asked for
pub const MAX_COOLDOWN_SECS: u64 = 86_400;

#[derive(Debug)]
struct CredentialSlot {
    credential: Credential,
    last_used_at: Option<DateTime<Utc>>,
    request_count: u64,
    is_active: bool,
    cooldown_until: Option<DateTime<Utc>>,
}

impl CredentialSlot {
    /// Earliest instant the slot may be handed out again
    fn ready_at(&self, min_spacing: Duration) -> Option<DateTime<Utc>> {
        let spacing_end = self.last_used_at.map(|t| t + min_spacing);
        match (spacing_end, self.cooldown_until) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    fn status(&self, now: DateTime<Utc>) -> CredentialStatus {
        CredentialStatus {
            id: self.credential.id().to_string(),
            masked_secret: self.credential.masked(),
            is_active: self.is_active,
            request_count: self.request_count,
            last_used_at: self.last_used_at,
            cooldown_until: self.cooldown_until.filter(|t| *t > now),
        }
    }
}

#[derive(Debug)]
struct PoolState {
    slots: Vec<CredentialSlot>,
    cursor: usize,
    daily_used: u64,
    daily_reset_date: NaiveDate,
}

impl PoolState {
    fn roll_day(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.daily_reset_date {
            info!(
                "Daily credential budget reset ({} used on {})",
                self.daily_used, self.daily_reset_date
            );
            self.daily_used = 0;
            self.daily_reset_date = today;
        }
    }

    fn slot_mut(&mut self, id: &str) -> Result<&mut CredentialSlot, KeyPoolError> {
        self.slots
            .iter_mut()
            .find(|s| s.credential.id() == id)
            .ok_or_else(|| KeyPoolError::UnknownCredential(id.to_string()))
    }
}

/// Owns the fixed set of API credentials.
///
/// `acquire` never waits: it either returns a credential or reports why none
/// is available, and the caller decides whether to reject or retry.
pub struct KeyPool {
    state: Mutex<PoolState>,
    min_spacing: Duration,
    daily_budget: u64,
    default_cooldown: Duration,
}

impl KeyPool {
    pub fn new(config: &KeyPoolConfig) -> Result<Self, KeyPoolError> {
        Self::new_at(config, Utc::now())
    }

    pub fn new_at(config: &KeyPoolConfig, now: DateTime<Utc>) -> Result<Self, KeyPoolError> {
        config.validate().map_err(KeyPoolError::InvalidConfig)?;

        let slots = config
            .keys
            .iter()
            .enumerate()
            .map(|(index, secret)| CredentialSlot {
                credential: Credential::new(format!("key-{}", index), secret.clone()),
                last_used_at: None,
                request_count: 0,
                is_active: true,
                cooldown_until: None,
            })
            .collect::<Vec<_>>();

        info!(
            "Key pool ready: {} credentials, {}ms spacing, daily budget {}",
            slots.len(),
            config.min_spacing_ms,
            config.daily_budget
        );

        Ok(Self {
            state: Mutex::new(PoolState {
                slots,
                cursor: 0,
                daily_used: 0,
                daily_reset_date: now.date_naive(),
            }),
            min_spacing: Duration::milliseconds(config.min_spacing_ms as i64),
            daily_budget: config.daily_budget,
            default_cooldown: Duration::seconds(config.rate_limit_cooldown_secs as i64),
        })
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn default_cooldown(&self) -> Duration {
        self.default_cooldown
    }

    /// Hand out the next eligible credential
    pub fn acquire(&self) -> Result<CredentialLease, KeyPoolError> {
        self.acquire_at(Utc::now())
    }

    pub fn acquire_at(&self, now: DateTime<Utc>) -> Result<CredentialLease, KeyPoolError> {
        let mut state = self.lock();
        state.roll_day(now);

        if state.daily_used >= self.daily_budget {
            return Err(KeyPoolError::Exhausted(Exhaustion::DailyBudget {
                resets_at: next_midnight(now),
            }));
        }

        let count = state.slots.len();
        let mut soonest: Option<DateTime<Utc>> = None;

        for offset in 0..count {
            let index = (state.cursor + offset) % count;
            let slot = &mut state.slots[index];
            if !slot.is_active {
                continue;
            }

            match slot.ready_at(self.min_spacing) {
                Some(ready) if now < ready => {
                    soonest = Some(soonest.map_or(ready, |s| s.min(ready)));
                }
                _ => {
                    slot.last_used_at = Some(now);
                    slot.request_count += 1;
                    let credential = slot.credential.clone();

                    state.cursor = (index + 1) % count;
                    state.daily_used += 1;
                    debug!(
                        "Selected credential {} ({}/{} daily)",
                        credential.id(),
                        state.daily_used,
                        self.daily_budget
                    );
                    return Ok(CredentialLease {
                        credential,
                        leased_at: now,
                    });
                }
            }
        }

        let cause = match soonest {
            Some(ready) => Exhaustion::Cooldown {
                retry_after: (ready - now).to_std().unwrap_or_default(),
            },
            None => Exhaustion::NoActiveCredentials,
        };
        Err(KeyPoolError::Exhausted(cause))
    }

    /// Take a credential out of rotation until reactivated
    pub fn deactivate(&self, id: &str) -> Result<(), KeyPoolError> {
        let mut state = self.lock();
        let slot = state.slot_mut(id)?;
        if slot.is_active {
            slot.is_active = false;
            warn!("Credential {} deactivated", id);
        }
        Ok(())
    }

    pub fn reactivate(&self, id: &str) -> Result<(), KeyPoolError> {
        let mut state = self.lock();
        let slot = state.slot_mut(id)?;
        slot.is_active = true;
        slot.cooldown_until = None;
        info!("Credential {} reactivated", id);
        Ok(())
    }

    /// Reactivate every credential and clear cooldowns. Returns how many were
    /// inactive.
    pub fn reactivate_all(&self) -> usize {
        let mut state = self.lock();
        let mut revived = 0;
        for slot in state.slots.iter_mut() {
            if !slot.is_active {
                revived += 1;
            }
            slot.is_active = true;
            slot.cooldown_until = None;
        }
        info!("All credentials reactivated ({} were inactive)", revived);
        revived
    }

    /// Keep a rate-limited credential out of rotation for `duration`
    pub fn cool_down(&self, id: &str, duration: Duration) -> Result<(), KeyPoolError> {
        self.cool_down_at(id, duration, Utc::now())
    }

    pub fn cool_down_at(
        &self,
        id: &str,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), KeyPoolError> {
        let mut state = self.lock();
        let slot = state.slot_mut(id)?;
        let duration = duration
            .max(Duration::zero())
            .min(Duration::seconds(MAX_COOLDOWN_SECS as i64));
        let until = now.checked_add_signed(duration).unwrap_or(now);
        let until = slot.cooldown_until.map_or(until, |existing| existing.max(until));
        slot.cooldown_until = Some(until);
        warn!("Credential {} cooling down until {}", id, until);
        Ok(())
    }

    pub fn status(&self) -> PoolStatus {
        self.status_at(Utc::now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> PoolStatus {
        let mut state = self.lock();
        state.roll_day(now);

        let credentials: Vec<CredentialStatus> =
            state.slots.iter().map(|s| s.status(now)).collect();
        let active = credentials.iter().filter(|c| c.is_active).count();
        let cooling_down = credentials
            .iter()
            .filter(|c| c.is_active && c.cooldown_until.is_some())
            .count();

        PoolStatus {
            total: credentials.len(),
            active,
            inactive: credentials.len() - active,
            cooling_down,
            daily_used: state.daily_used,
            daily_budget: self.daily_budget,
            daily_reset_date: state.daily_reset_date,
            credentials,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
