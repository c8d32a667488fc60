// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Wire models exchanged with the session service.

use serde::{Deserialize, Serialize};

pub use crate::crypto::ShareMetadata;

/// Longest session the service accepts (7 days)
pub const MAX_SESSION_TIMEOUT_SECS: u64 = 7 * 86_400;

/// Timeout sent with an invalidation request: expire immediately
pub const INVALIDATE_TIMEOUT_SECS: u64 = 1;

/// Body of `POST /session`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequestBody {
    /// `04`-tagged uncompressed session public key
    pub key: String,
    /// Serialized [`ShareMetadata`] JSON
    pub data: String,
    /// Hex DER ECDSA signature over `data`
    pub signature: String,
    /// Requested lifetime in seconds
    pub timeout: u64,
}

/// Body of `GET /session/{key}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    /// Serialized [`ShareMetadata`] JSON, possibly absent for unknown keys
    #[serde(default)]
    pub message: Option<String>,
}

impl AuthorizeResponse {
    /// The envelope JSON, if the service returned a non-empty one
    pub fn envelope_json(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

/// Lifecycle state as observed by this client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unestablished,
    /// Holds the `04`-tagged public key; the scalar stays in the secret store
    Active { public_key: String },
    Invalidated,
}

/// Clamp a requested lifetime to [`MAX_SESSION_TIMEOUT_SECS`]
pub fn clamp_session_timeout(requested_secs: u64) -> u64 {
    requested_secs.min(MAX_SESSION_TIMEOUT_SECS)
}

/// First 16 hex characters of a public key, for logs
pub(crate) fn short_key(public_key: &str) -> String {
    format!("{}…", &public_key[..public_key.len().min(16)])
}
