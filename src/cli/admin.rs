// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use clap::Args;
use reqwest::{Client, Method};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Connection options shared by every admin command
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Base URL of the caption gate
    #[arg(long, env = "CAPTION_GATE_URL", default_value = "http://127.0.0.1:8080")]
    pub url: String,

    /// Admin bearer token
    #[arg(long, env = "CAPTION_ADMIN_TOKEN")]
    pub token: String,
}

#[derive(Args, Debug)]
pub struct IdentityArgs {
    /// `anon:<ip>`, `user:<id>`, an email or an IP address
    pub identity: String,
}

#[derive(Args, Debug)]
pub struct CredentialArgs {
    /// Credential id as shown by `status` (e.g. key-0)
    pub id: String,
}

#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Remove entries created more than this many days ago; defaults to the
    /// server's configured max age
    #[arg(long)]
    pub older_than_days: Option<u32>,
}

/// Thin client for the `/admin` routes
pub struct AdminClient {
    client: Client,
    base: Url,
    token: String,
}

impl AdminClient {
    pub fn new(args: &ConnectionArgs) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let base = Url::parse(args.url.trim_end_matches('/'))
            .map_err(|e| anyhow!("invalid gate URL '{}': {}", args.url, e))?;
        Ok(Self {
            client,
            base,
            token: args.token.clone(),
        })
    }

    /// Build `/admin/<segments...>` with each segment percent-encoded
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("gate URL cannot be a base: {}", self.base))?
            .pop_if_empty()
            .push("admin")
            .extend(segments);
        Ok(url)
    }

    pub async fn call(&self, method: Method, url: Url) -> Result<serde_json::Value> {
        debug!("{} {}", method, url);
        let response = self
            .client
            .request(method, url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);
        if !status.is_success() {
            let message = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("no error message");
            return Err(anyhow!("gate returned {}: {}", status, message));
        }
        Ok(body)
    }

    pub async fn status(&self) -> Result<serde_json::Value> {
        self.call(Method::GET, self.endpoint(&["status"])?).await
    }

    pub async fn quota(&self, identity: &str) -> Result<serde_json::Value> {
        self.call(Method::GET, self.endpoint(&["quota", identity])?)
            .await
    }

    pub async fn blocks(&self) -> Result<serde_json::Value> {
        self.call(Method::GET, self.endpoint(&["blocks"])?).await
    }

    pub async fn unblock(&self, identity: &str) -> Result<serde_json::Value> {
        self.call(Method::DELETE, self.endpoint(&["blocks", identity])?)
            .await
    }

    pub async fn deactivate(&self, id: &str) -> Result<serde_json::Value> {
        self.call(Method::POST, self.endpoint(&["keys", id, "deactivate"])?)
            .await
    }

    pub async fn reactivate(&self, id: &str) -> Result<serde_json::Value> {
        self.call(Method::POST, self.endpoint(&["keys", id, "reactivate"])?)
            .await
    }

    pub async fn reactivate_all(&self) -> Result<serde_json::Value> {
        self.call(Method::POST, self.endpoint(&["keys", "reactivate-all"])?)
            .await
    }

    pub async fn purge_cache(&self, older_than_days: Option<u32>) -> Result<serde_json::Value> {
        let mut url = self.endpoint(&["cache", "purge"])?;
        if let Some(days) = older_than_days {
            url.query_pairs_mut()
                .append_pair("olderThanDays", &days.to_string());
        }
        self.call(Method::POST, url).await
    }
}
