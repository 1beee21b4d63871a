// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption generation orchestration
//!
//! Each request passes burst limiting, the blocklist, the cache, quota and
//! credential selection before the backend is called. Every check can end
//! the request early with a classified `CaptionError`.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::config::ServiceConfig;
use super::types::{CaptionError, CaptionRequest, CaptionResponse, Identity};
use crate::blocklist::{AbuseMonitor, BlockStatus, Blocklist};
use crate::cache::{CacheLookup, CaptionCache, Fingerprint};
use crate::config::GateConfig;
use crate::generation::{BackendError, CaptionBackend, GenerationInput};
use crate::keypool::{CredentialLease, KeyPool, KeyPoolError, MAX_COOLDOWN_SECS};
use crate::limiter::{BurstDecision, BurstLimiter};
use crate::monitoring::GateMetrics;
use crate::quota::{denial_guidance, QuotaDecision, QuotaTracker};
use crate::store::{PersistentStore, StoreError};

/// Quota slot taken for the current request
struct Reservation {
    identity: String,
    period_start: DateTime<Utc>,
    remaining: u32,
}

pub struct CaptionService {
    store: Arc<dyn PersistentStore>,
    burst: Arc<BurstLimiter>,
    blocklist: Arc<Blocklist>,
    abuse: Arc<AbuseMonitor>,
    cache: Arc<CaptionCache>,
    quota: Arc<QuotaTracker>,
    pool: Arc<KeyPool>,
    backend: Arc<dyn CaptionBackend>,
    metrics: Arc<GateMetrics>,
    config: ServiceConfig,
    generation_timeout: Duration,
    captions_per_request: usize,
}

impl CaptionService {
    /// Build every component from `config` over a shared store and backend
    pub fn from_config(
        config: &GateConfig,
        store: Arc<dyn PersistentStore>,
        backend: Arc<dyn CaptionBackend>,
    ) -> anyhow::Result<Self> {
        let pool = KeyPool::new(&config.keys)?;
        let blocklist = Arc::new(Blocklist::new(store.clone(), config.blocklist.clone()));
        let abuse = Arc::new(AbuseMonitor::new(blocklist.clone()));
        let metrics = GateMetrics::new()?;

        info!(
            "Caption service ready: backend={}, burst={}/{}s, cache={}",
            backend.name(),
            config.burst.max_requests,
            config.burst.window_secs,
            if config.cache.enabled { "on" } else { "off" }
        );

        Ok(Self {
            burst: Arc::new(BurstLimiter::new(&config.burst)),
            cache: Arc::new(CaptionCache::new(store.clone(), config.cache.clone())),
            quota: Arc::new(QuotaTracker::new(store.clone(), config.quota.clone())),
            pool: Arc::new(pool),
            store,
            blocklist,
            abuse,
            backend,
            metrics: Arc::new(metrics),
            config: config.service.clone(),
            generation_timeout: Duration::from_millis(config.generation.timeout_ms),
            captions_per_request: config.generation.captions_per_request,
        })
    }

    pub fn store(&self) -> &Arc<dyn PersistentStore> {
        &self.store
    }

    pub fn burst(&self) -> &Arc<BurstLimiter> {
        &self.burst
    }

    pub fn blocklist(&self) -> &Arc<Blocklist> {
        &self.blocklist
    }

    pub fn abuse(&self) -> &Arc<AbuseMonitor> {
        &self.abuse
    }

    pub fn cache(&self) -> &Arc<CaptionCache> {
        &self.cache
    }

    pub fn quota(&self) -> &Arc<QuotaTracker> {
        &self.quota
    }

    pub fn pool(&self) -> &Arc<KeyPool> {
        &self.pool
    }

    pub fn metrics(&self) -> &Arc<GateMetrics> {
        &self.metrics
    }

    /// Serve one caption request
    pub async fn generate(&self, request: &CaptionRequest) -> Result<CaptionResponse, CaptionError> {
        let result = self.run(request).await;
        match &result {
            Ok(response) if response.from_cache => self.metrics.record_outcome("cache_hit"),
            Ok(_) => self.metrics.record_outcome("success"),
            Err(e) => self.metrics.record_outcome(e.error_kind()),
        }
        result
    }

    async fn run(&self, request: &CaptionRequest) -> Result<CaptionResponse, CaptionError> {
        request.validate()?;
        let identity = &request.identity;
        let key = identity.quota_key();

        self.check_burst(&key)?;
        self.check_blocked(identity).await?;

        let fingerprint = Fingerprint::compute(
            &request.image.url,
            request.description.as_deref(),
            &request.mood,
        );
        if let CacheLookup::Hit(captions) = self.cache.lookup(&fingerprint).await {
            self.metrics.record_cache_hit();
            debug!("Serving {} from cache for {}", fingerprint, key);
            return Ok(CaptionResponse {
                captions,
                from_cache: true,
                remaining_quota: None,
            });
        }
        self.metrics.record_cache_miss();

        let reservation = self.reserve_quota(identity).await?;

        let lease = match self.acquire_credential() {
            Ok(lease) => lease,
            Err(e) => {
                self.maybe_refund(reservation.as_ref()).await;
                return Err(e);
            }
        };

        let input = GenerationInput {
            image_url: request.image.url.trim().to_string(),
            mood: request.mood.trim().to_string(),
            description: request
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from),
        };

        let captions = match self.call_backend(&lease, &input).await {
            Ok(captions) => captions,
            Err(e) => {
                self.maybe_refund(reservation.as_ref()).await;
                return Err(e);
            }
        };

        self.cache.spawn_store(
            fingerprint,
            captions.clone(),
            identity.user_id.clone(),
        );

        Ok(CaptionResponse {
            captions,
            from_cache: false,
            remaining_quota: reservation.map(|r| r.remaining),
        })
    }

    fn check_burst(&self, key: &str) -> Result<(), CaptionError> {
        match self.burst.check(key) {
            BurstDecision::Allowed { .. } => Ok(()),
            BurstDecision::Limited { retry_after } => {
                debug!("Burst limit hit for {}", key);
                Err(CaptionError::RateLimited {
                    retry_after_secs: ceil_secs(retry_after),
                })
            }
        }
    }

    async fn check_blocked(&self, identity: &Identity) -> Result<(), CaptionError> {
        let targets = identity.block_targets();
        match self.blocklist.any_blocked_at(&targets, Utc::now()).await {
            Ok(BlockStatus::NotBlocked) => Ok(()),
            Ok(BlockStatus::Blocked {
                hours_remaining,
                reason,
                ..
            }) => {
                warn!(
                    "Rejected blocked identity {} ({}h remaining)",
                    identity.quota_key(),
                    hours_remaining
                );
                Err(CaptionError::Blocked {
                    hours_remaining,
                    category: reason.category().to_string(),
                })
            }
            Err(e) => self.on_store_failure("blocklist", e),
        }
    }

    async fn reserve_quota(&self, identity: &Identity) -> Result<Option<Reservation>, CaptionError> {
        let key = identity.quota_key();
        let tier = identity.tier();
        let now = Utc::now();

        match self.quota.check_and_reserve_at(&key, tier, now).await {
            Ok(QuotaDecision::Allowed {
                remaining,
                period_start,
                ..
            }) => Ok(Some(Reservation {
                identity: key,
                period_start,
                remaining,
            })),
            Ok(QuotaDecision::Denied { tier, reset_at }) => {
                debug!("{} for {}", denial_guidance(tier), key);
                Err(CaptionError::QuotaExceeded {
                    tier,
                    reset_at,
                    retry_after_secs: (reset_at - now).num_seconds().max(1) as u64,
                })
            }
            Err(e) => self.on_store_failure("quota", e).map(|_| None),
        }
    }

    fn on_store_failure(&self, check: &str, e: StoreError) -> Result<(), CaptionError> {
        if self.config.fail_open_on_store_error {
            warn!("Store error during {} check, continuing (fail-open): {}", check, e);
            Ok(())
        } else {
            error!("Store error during {} check, rejecting request: {}", check, e);
            Err(CaptionError::StoreUnavailable(e.to_string()))
        }
    }

    fn acquire_credential(&self) -> Result<CredentialLease, CaptionError> {
        let now = Utc::now();
        let result = self.pool.acquire_at(now);
        self.refresh_pool_gauges();

        result.map_err(|e| match e {
            KeyPoolError::Exhausted(cause) => {
                error!("Credential pool exhausted: {}", cause);
                CaptionError::CapacityExhausted {
                    reason: cause.to_string(),
                    retry_after_secs: cause.retry_after_secs(now),
                }
            }
            other => {
                error!("Credential selection failed: {}", other);
                CaptionError::CapacityExhausted {
                    reason: other.to_string(),
                    retry_after_secs: None,
                }
            }
        })
    }

    fn refresh_pool_gauges(&self) {
        let status = self.pool.status();
        self.metrics
            .set_pool_usage(status.daily_used, status.daily_budget, status.active);
    }

    /// One attempt, bounded by the generation timeout; never retried here
    async fn call_backend(
        &self,
        lease: &CredentialLease,
        input: &GenerationInput,
    ) -> Result<Vec<String>, CaptionError> {
        let started = Instant::now();
        let outcome =
            tokio::time::timeout(self.generation_timeout, self.backend.generate(lease, input))
                .await;
        self.metrics
            .observe_backend_latency(started.elapsed().as_secs_f64());

        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout {
                timeout_ms: self.generation_timeout.as_millis() as u64,
            }),
        };

        match result {
            Ok(mut captions) => {
                if captions.len() < self.captions_per_request {
                    warn!(
                        "Backend {} returned {} captions, expected {}",
                        self.backend.name(),
                        captions.len(),
                        self.captions_per_request
                    );
                    return Err(CaptionError::GenerationFailed(format!(
                        "backend returned {} captions",
                        captions.len()
                    )));
                }
                captions.truncate(self.captions_per_request);
                Ok(captions)
            }
            Err(e) => {
                self.apply_backend_feedback(lease, &e);
                warn!("Generation failed with {}: {}", lease.id(), e);
                Err(CaptionError::GenerationFailed(e.to_string()))
            }
        }
    }

    fn apply_backend_feedback(&self, lease: &CredentialLease, e: &BackendError) {
        let result = match e {
            BackendError::RateLimited { retry_after_secs } => {
                let cooldown = retry_after_secs
                    .map(|s| ChronoDuration::seconds(s.min(MAX_COOLDOWN_SECS) as i64))
                    .unwrap_or_else(|| self.pool.default_cooldown());
                self.pool.cool_down(lease.id(), cooldown)
            }
            BackendError::CredentialRejected { .. } => self.pool.deactivate(lease.id()),
            _ => Ok(()),
        };
        if let Err(err) = result {
            warn!("Could not update credential {}: {}", lease.id(), err);
        }
    }

    async fn maybe_refund(&self, reservation: Option<&Reservation>) {
        if !self.config.refund_on_generation_failure {
            return;
        }
        if let Some(reservation) = reservation {
            if let Err(e) = self
                .quota
                .refund(&reservation.identity, reservation.period_start)
                .await
            {
                warn!("Quota refund failed for {}: {}", reservation.identity, e);
            }
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    (duration.as_secs() + u64::from(duration.subsec_nanos() > 0)).max(1)
}
