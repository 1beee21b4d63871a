// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Generation backend trait definition

use async_trait::async_trait;

use super::types::{BackendError, GenerationInput};
use crate::keypool::CredentialLease;

/// The external AI call that turns an image descriptor into captions.
///
/// Implementations make exactly one attempt with the leased credential; the
/// orchestrator never retries inside a request.
#[async_trait]
pub trait CaptionBackend: Send + Sync {
    async fn generate(
        &self,
        credential: &CredentialLease,
        input: &GenerationInput,
    ) -> Result<Vec<String>, BackendError>;

    /// Backend name for logging and metrics
    fn name(&self) -> &'static str;
}
