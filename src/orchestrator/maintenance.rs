// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Periodic cleanup off the request path

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::config::MaintenanceConfig;
use super::service::CaptionService;

/// What one maintenance pass removed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceReport {
    pub burst_entries_swept: usize,
    pub abuse_counters_swept: usize,
    pub blocks_purged: usize,
    pub cache_entries_purged: usize,
    pub flushed: bool,
}

pub struct MaintenanceTask {
    service: Arc<CaptionService>,
    config: MaintenanceConfig,
}

impl MaintenanceTask {
    pub fn new(service: Arc<CaptionService>, config: MaintenanceConfig) -> Self {
        Self { service, config }
    }

    /// Run one cleanup pass. Each step is independent; a store failure in
    /// one is logged and the rest still run.
    pub async fn run_once(&self) -> MaintenanceReport {
        self.run_once_at(Utc::now(), Instant::now()).await
    }

    pub async fn run_once_at(&self, now: DateTime<Utc>, instant: Instant) -> MaintenanceReport {
        let mut report = MaintenanceReport {
            burst_entries_swept: self.service.burst().sweep_expired_at(instant),
            abuse_counters_swept: self.service.abuse().sweep(),
            ..Default::default()
        };

        match self.service.blocklist().purge_expired_at(now).await {
            Ok(purged) => report.blocks_purged = purged,
            Err(e) => warn!("Block TTL sweep failed: {}", e),
        }

        if self.config.purge_cache {
            let max_age_days = self.service.cache().config().max_age_days;
            match self
                .service
                .cache()
                .purge_older_than_at(max_age_days, now)
                .await
            {
                Ok(purged) => report.cache_entries_purged = purged,
                Err(e) => warn!("Cache cleanup failed: {}", e),
            }
        }

        match self.service.store().flush().await {
            Ok(()) => report.flushed = true,
            Err(e) => warn!("Store flush failed: {}", e),
        }

        info!(
            "Maintenance: {} burst entries, {} abuse counters, {} blocks, {} cache entries removed",
            report.burst_entries_swept,
            report.abuse_counters_swept,
            report.blocks_purged,
            report.cache_entries_purged
        );
        report
    }

    /// Run on a fixed interval until `cancel` fires, then flush once more
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(self.config.interval_secs));
            // The first tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.run_once().await;
                    }
                    _ = cancel.cancelled() => {
                        if let Err(e) = self.service.store().flush().await {
                            warn!("Final store flush failed: {}", e);
                        }
                        info!("Maintenance task stopped");
                        break;
                    }
                }
            }
        })
    }
}
