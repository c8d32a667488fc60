// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Network Reachability
//!
//! Consulted before every transport call. When the service is unreachable,
//! lifecycle operations fail with `NetworkUnavailable` without a request.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

use super::error::TransportError;

/// Reports whether the session service can currently be reached
#[async_trait]
pub trait Reachability: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Fixed answer, switchable at runtime
#[derive(Debug, Default)]
pub struct StaticReachability {
    reachable: AtomicBool,
}

impl StaticReachability {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
        }
    }

    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn offline() -> Self {
        Self::new(false)
    }

    pub fn set(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl Reachability for StaticReachability {
    async fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}

/// Probes the service host with a TCP connect
#[derive(Debug, Clone)]
pub struct TcpReachability {
    address: String,
    timeout: Duration,
}

impl TcpReachability {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let url = url::Url::parse(server_url)
            .map_err(|e| TransportError::Config(format!("invalid server url: {}", e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| TransportError::Config("server url has no host".to_string()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| TransportError::Config("server url has no port".to_string()))?;

        Ok(Self {
            address: format!("{}:{}", host, port),
            timeout,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl Reachability for TcpReachability {
    async fn is_reachable(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Session service {} unreachable: {}", self.address, e);
                false
            }
            Err(_) => {
                debug!("Session service {} probe timed out", self.address);
                false
            }
        }
    }
}
