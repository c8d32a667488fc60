// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session lifecycle and collaborator error types.

use thiserror::Error;

use crate::crypto::CryptoError;

/// Errors surfaced by [`SessionManager`](super::SessionManager) operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Network unavailable")]
    NetworkUnavailable,

    #[error("Session id not found")]
    SessionIdMissing,

    #[error("Session expired or unknown to the session service")]
    SessionExpired,

    #[error("Failed to create session: {0}")]
    SessionCreate(String),

    #[error("Failed to invalidate session: {0}")]
    SessionInvalidation(String),

    /// The fetched envelope could not be parsed or opened with the local key
    #[error("No user found for session: {0}")]
    UserNotFound(#[source] CryptoError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

/// Secret store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(String),
    #[error("Store format error: {0}")]
    Format(String),
    #[error("Store decryption failed for key '{0}'")]
    Decryption(String),
    #[error("Store encryption failed: {0}")]
    Encryption(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

/// Transport failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Session service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid response: {0}")]
    Decode(String),
    #[error("Invalid transport configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}
