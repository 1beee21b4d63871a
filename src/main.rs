// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use caption_gate::{
    api::{create_app, serve, AppState},
    config::GateConfig,
    generation::HttpCaptionBackend,
    orchestrator::{CaptionService, MaintenanceTask},
    store::{MemoryStore, PersistentStore},
};
use std::{env, sync::Arc};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    info!("Starting {}", caption_gate::version::get_version_string());

    let config = GateConfig::load().context("loading configuration")?;
    config.validate().context("validating configuration")?;
    info!(
        "Loaded {} credentials, quotas anonymous={} authenticated={}",
        config.keys.keys.len(),
        config.quota.anonymous.max_requests,
        config.quota.authenticated.max_requests
    );

    let store: Arc<dyn PersistentStore> = match &config.server.store_path {
        Some(path) => Arc::new(
            MemoryStore::open(path)
                .await
                .with_context(|| format!("opening store snapshot {}", path))?,
        ),
        None => {
            warn!("CAPTION_STORE_PATH not set; quota, block and cache state will not survive restarts");
            Arc::new(MemoryStore::new())
        }
    };

    let backend = Arc::new(HttpCaptionBackend::new(&config.generation)?);
    let service = Arc::new(CaptionService::from_config(&config, store.clone(), backend)?);

    let shutdown = CancellationToken::new();
    let maintenance =
        MaintenanceTask::new(service.clone(), config.maintenance.clone()).spawn(shutdown.clone());

    if config.server.admin_token.is_none() {
        warn!("CAPTION_ADMIN_TOKEN not set; admin routes are disabled");
    }
    let app = create_app(AppState::new(service, config.server.admin_token.clone()));

    let server = tokio::spawn(serve(app, config.server.bind_addr, shutdown.clone()));

    signal::ctrl_c().await?;
    info!("Shutting down...");
    shutdown.cancel();

    server.await??;
    maintenance.await?;
    info!("Caption gate stopped");
    Ok(())
}
