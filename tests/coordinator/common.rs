// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared fixtures for coordinator tests

use async_trait::async_trait;
use caption_gate::{
    config::GateConfig,
    generation::{BackendError, CaptionBackend, GenerationInput},
    keypool::CredentialLease,
    orchestrator::{CaptionRequest, CaptionService, Identity, ImageDescriptor},
    store::{MemoryStore, PersistentStore},
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ADMIN_TOKEN: &str = "test-admin-token-0123456789";

/// Backend that replays scripted outcomes, then succeeds
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<Vec<String>, BackendError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    credentials_seen: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            delay: None,
            calls: AtomicUsize::new(0),
            credentials_seen: Mutex::new(Vec::new()),
        }
    }

    /// Every call sleeps for `delay` before answering
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn push(&self, outcome: Result<Vec<String>, BackendError>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn credentials_seen(&self) -> Vec<String> {
        self.credentials_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CaptionBackend for ScriptedBackend {
    async fn generate(
        &self,
        lease: &CredentialLease,
        input: &GenerationInput,
    ) -> Result<Vec<String>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.credentials_seen
            .lock()
            .unwrap()
            .push(lease.id().to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(default_captions(&input.mood)))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub fn default_captions(mood: &str) -> Vec<String> {
    (1..=3).map(|i| format!("{} caption {}", mood, i)).collect()
}

/// Config with no spacing, generous burst limits and the default quotas
pub fn test_config(keys: usize) -> GateConfig {
    let mut config = GateConfig::default();
    config.keys.keys = (0..keys).map(|i| format!("sk-test-{:04}", i)).collect();
    config.keys.min_spacing_ms = 0;
    config.keys.daily_budget = 1000;
    config.burst.max_requests = 100;
    config.generation.timeout_ms = 2000;
    config.server.admin_token = Some(ADMIN_TOKEN.to_string());
    config
}

pub struct Harness {
    pub service: Arc<CaptionService>,
    pub store: Arc<MemoryStore>,
    pub backend: Arc<ScriptedBackend>,
}

pub fn harness(config: &GateConfig, backend: ScriptedBackend) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let backend = Arc::new(backend);
    let shared_store: Arc<dyn PersistentStore> = store.clone();
    let service = CaptionService::from_config(config, shared_store, backend.clone())
        .expect("service should build");
    Harness {
        service: Arc::new(service),
        store,
        backend,
    }
}

pub fn request(identity: Identity, url: &str, mood: &str) -> CaptionRequest {
    CaptionRequest {
        identity,
        image: ImageDescriptor {
            url: url.to_string(),
        },
        mood: mood.to_string(),
        description: None,
    }
}

/// Wait for the fire-and-forget cache write to land
pub async fn wait_for_cache_entries(store: &MemoryStore, expected: usize) {
    for _ in 0..100 {
        if store.count_cache_entries().await.unwrap_or(0) >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("cache never reached {} entries", expected);
}
