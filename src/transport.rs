use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

/// Body of the POST to the chat endpoint.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRequest {
    pub message: String,
}

/// Body the chat endpoint answers with. `reply` may be missing.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingReply {
    #[serde(default)]
    pub reply: Option<String>,
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed reply body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One JSON request/response exchange with the chat endpoint.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn exchange(
        &self,
        request: &OutgoingRequest,
        csrf_token: Option<&str>,
    ) -> Result<IncomingReply, ExchangeError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    endpoint: Url,
    csrf_header: String,
    bootstrap_path: Option<String>,
}

impl HttpTransport {
    /// Build a client whose cookie store is `jar`, seeded with any cookies
    /// from the config.
    pub fn new(config: &Config, jar: Arc<Jar>) -> Result<Self> {
        let base_url = config.base_url()?;
        let endpoint = base_url
            .join(&config.endpoint)
            .with_context(|| format!("Invalid endpoint path: {}", config.endpoint))?;

        for cookie in &config.cookies {
            jar.add_cookie_str(cookie, &base_url);
        }

        let mut builder = Client::builder().cookie_provider(jar);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            endpoint,
            csrf_header: config.csrf_header.clone(),
            bootstrap_path: config.bootstrap_path.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GET the bootstrap page so the server can set its CSRF and session
    /// cookies in the jar. Best effort: failures are only logged.
    pub async fn bootstrap(&self) {
        let Some(path) = &self.bootstrap_path else {
            return;
        };

        let url = match self.base_url.join(path) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Invalid bootstrap path {}: {}", path, e);
                return;
            }
        };

        match self.client.get(url.clone()).send().await {
            Ok(response) => {
                tracing::info!("Bootstrapped session from {} ({})", url, response.status());
            }
            Err(e) => {
                tracing::warn!("Session bootstrap from {} failed: {}", url, e);
            }
        }
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn exchange(
        &self,
        request: &OutgoingRequest,
        csrf_token: Option<&str>,
    ) -> Result<IncomingReply, ExchangeError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(self.csrf_header.as_str(), csrf_token.unwrap_or_default())
            .json(request)
            .send()
            .await?;

        // The body is parsed whatever the status, a 4xx with a JSON body is
        // handled like any other reply.
        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Chat endpoint answered with status {}", status);
        }

        let body = response.bytes().await?;
        let reply: IncomingReply = serde_json::from_slice(&body)?;
        Ok(reply)
    }
}
