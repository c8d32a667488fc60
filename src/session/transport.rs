// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session service transport
//!
//! `POST {base}/session` stores or expires an envelope;
//! `GET {base}/session/{04pubKeyHex}` fetches it back.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::error::TransportError;
use super::types::{short_key, AuthorizeResponse, SessionRequestBody};
use crate::config::SessionConfig;

/// Round trips to the remote session service
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Store a new envelope
    async fn create_session(&self, body: &SessionRequestBody) -> Result<(), TransportError>;

    /// Fetch the envelope stored under `public_key` (`04`-tagged).
    /// `Ok(None)` means the service answered without a body.
    async fn authorize_session(&self, public_key: &str) -> Result<Option<AuthorizeResponse>, TransportError>;

    /// Ask the service to expire an envelope
    async fn invalidate_session(&self, body: &SessionRequestBody) -> Result<(), TransportError>;
}

/// `reqwest`-backed transport with a client-side request timeout
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| TransportError::Config(format!("invalid base url '{}': {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TransportError::Config(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, TransportError> {
        Self::new(&config.server_url, config.request_timeout())
    }

    fn session_url(&self) -> String {
        format!("{}/session", self.base_url)
    }

    async fn post_session(&self, body: &SessionRequestBody) -> Result<(), TransportError> {
        let response = self
            .client
            .post(self.session_url())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            body: text,
        })
    }
}

#[async_trait]
impl SessionTransport for HttpTransport {
    async fn create_session(&self, body: &SessionRequestBody) -> Result<(), TransportError> {
        debug!("POST {} (timeout={})", self.session_url(), body.timeout);
        self.post_session(body).await
    }

    async fn authorize_session(&self, public_key: &str) -> Result<Option<AuthorizeResponse>, TransportError> {
        let url = format!("{}/{}", self.session_url(), public_key);
        debug!("GET {}/{}", self.session_url(), short_key(public_key));

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| TransportError::Decode(e.to_string()))
    }

    async fn invalidate_session(&self, body: &SessionRequestBody) -> Result<(), TransportError> {
        debug!("POST {} (invalidate, timeout={})", self.session_url(), body.timeout);
        self.post_session(body).await
    }
}
