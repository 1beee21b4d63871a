// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption backend for OpenAI-compatible chat completion APIs

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::backend::CaptionBackend;
use super::config::GenerationConfig;
use super::types::{BackendError, GenerationInput};
use crate::keypool::CredentialLease;

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub struct HttpCaptionBackend {
    client: Client,
    endpoint: String,
    model: String,
    captions_per_request: usize,
    client_timeout_ms: u64,
}

impl HttpCaptionBackend {
    pub fn new(config: &GenerationConfig) -> Result<Self, BackendError> {
        // Outer bound only; the orchestrator enforces `timeout_ms` per call
        let client_timeout_ms = config.timeout_ms.saturating_mul(2);
        let client = Client::builder()
            .timeout(Duration::from_millis(client_timeout_ms))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        info!(
            "Caption backend configured: endpoint={}, model={}",
            endpoint, config.model
        );

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            captions_per_request: config.captions_per_request,
            client_timeout_ms,
        })
    }

    fn request_body(&self, input: &GenerationInput) -> serde_json::Value {
        let mut instruction = format!(
            "Write {} short social media captions for this image in a {} mood. \
             Return one caption per line with no numbering.",
            self.captions_per_request, input.mood
        );
        if let Some(description) = input.description.as_deref().filter(|d| !d.trim().is_empty()) {
            instruction.push_str(&format!(" Context from the poster: {}", description.trim()));
        }

        serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": instruction },
                    { "type": "image_url", "image_url": { "url": input.image_url } }
                ]
            }]
        })
    }
}

#[async_trait]
impl CaptionBackend for HttpCaptionBackend {
    async fn generate(
        &self,
        credential: &CredentialLease,
        input: &GenerationInput,
    ) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/v1/chat/completions", self.endpoint);
        debug!("Caption generate POST {} with {}", url, credential.id());

        let response = self
            .client
            .post(&url)
            .bearer_auth(credential.secret())
            .json(&self.request_body(input))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout {
                        timeout_ms: self.client_timeout_ms,
                    }
                } else {
                    BackendError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status.as_u16(), retry_after, text));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BackendError::MalformedResponse("empty choices".to_string()))?;

        parse_captions(&content, self.captions_per_request)
    }

    fn name(&self) -> &'static str {
        "openai-compatible"
    }
}

/// Split model output into exactly `expected` captions
pub fn parse_captions(content: &str, expected: usize) -> Result<Vec<String>, BackendError> {
    let captions: Vec<String> = content
        .lines()
        .map(clean_caption_line)
        .filter(|line| !line.is_empty())
        .take(expected)
        .collect();

    if captions.len() < expected {
        return Err(BackendError::MalformedResponse(format!(
            "expected {} captions, got {}",
            expected,
            captions.len()
        )));
    }
    Ok(captions)
}

fn clean_caption_line(line: &str) -> String {
    let mut line = line.trim();
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            line = stripped;
        }
    }
    let line = line.trim_start().trim_start_matches(['-', '*', '•']);
    line.trim().trim_matches('"').trim().to_string()
}
