use super::contact::seed_nodes_url;
use super::protocol::SeedNodesResponse;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;

/// Asks a contact point for the seed nodes it knows about.
#[async_trait]
pub trait SeedNodesClient: Send + Sync {
    /// `base_uri` is the contact point's management base URI. Non-2xx responses
    /// and bodies that do not parse are errors.
    async fn probe(&self, base_uri: &Url, timeout: Duration) -> Result<SeedNodesResponse>;
}

/// `GET {base_uri}/bootstrap/seed-nodes` over reqwest.
pub struct HttpSeedNodesClient {
    http_client: reqwest::Client,
}

impl HttpSeedNodesClient {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpSeedNodesClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SeedNodesClient for HttpSeedNodesClient {
    async fn probe(&self, base_uri: &Url, timeout: Duration) -> Result<SeedNodesResponse> {
        let url = seed_nodes_url(base_uri)?;
        tracing::trace!("Probing {}", url);

        let response = self
            .http_client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .with_context(|| format!("Seed nodes request to {} failed", url))?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Seed nodes request to {} returned {}",
                url,
                response.status()
            ));
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("Reading seed nodes response from {} failed", url))?;

        serde_json::from_str(&body)
            .with_context(|| format!("Malformed seed nodes response from {}", url))
    }
}
