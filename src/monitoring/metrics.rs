// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prometheus metrics for the caption coordinator

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Request outcomes, cache effectiveness, backend latency and pool usage.
///
/// Each instance owns its registry so tests and embedded services do not
/// share global state.
pub struct GateMetrics {
    registry: Registry,
    outcomes: IntCounterVec,
    cache_hits: IntCounter,
    cache_misses: IntCounter,
    backend_latency: Histogram,
    pool_daily_used: IntGauge,
    pool_daily_budget: IntGauge,
    pool_active_credentials: IntGauge,
}

impl GateMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("caption_gate".to_string()), None)?;

        let outcomes = IntCounterVec::new(
            Opts::new("requests_total", "Caption requests by outcome"),
            &["outcome"],
        )?;
        let cache_hits = IntCounter::new("cache_hits_total", "Requests served from cache")?;
        let cache_misses = IntCounter::new("cache_misses_total", "Cache lookups that missed")?;
        let backend_latency = Histogram::with_opts(
            HistogramOpts::new(
                "backend_latency_seconds",
                "Latency of generation backend calls",
            )
            .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]),
        )?;
        let pool_daily_used =
            IntGauge::new("pool_daily_used", "Credential uses since the daily reset")?;
        let pool_daily_budget = IntGauge::new("pool_daily_budget", "Daily credential budget")?;
        let pool_active_credentials =
            IntGauge::new("pool_active_credentials", "Credentials currently in rotation")?;

        registry.register(Box::new(outcomes.clone()))?;
        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(backend_latency.clone()))?;
        registry.register(Box::new(pool_daily_used.clone()))?;
        registry.register(Box::new(pool_daily_budget.clone()))?;
        registry.register(Box::new(pool_active_credentials.clone()))?;

        Ok(Self {
            registry,
            outcomes,
            cache_hits,
            cache_misses,
            backend_latency,
            pool_daily_used,
            pool_daily_budget,
            pool_active_credentials,
        })
    }

    /// `outcome` is `success`, `cache_hit` or an error kind
    pub fn record_outcome(&self, outcome: &str) {
        self.outcomes.with_label_values(&[outcome]).inc();
    }

    pub fn outcome_count(&self, outcome: &str) -> u64 {
        self.outcomes.with_label_values(&[outcome]).get()
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.inc();
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.inc();
    }

    pub fn observe_backend_latency(&self, seconds: f64) {
        self.backend_latency.observe(seconds);
    }

    pub fn set_pool_usage(&self, daily_used: u64, daily_budget: u64, active: usize) {
        self.pool_daily_used.set(daily_used as i64);
        self.pool_daily_budget.set(daily_budget as i64);
        self.pool_active_credentials.set(active as i64);
    }

    /// Prometheus text exposition format
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
