// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Crypto Error Types
//!
//! Error kinds for key derivation, envelope encryption and request signing.
//!
//! ## Error Variants
//!
//! - **MacVerification**: envelope MAC did not match; the ciphertext was never decrypted
//! - **Padding**: PKCS#7 padding was malformed after a successful MAC check
//! - **KeyGeneration**: the entropy source failed while drawing a scalar
//! - **InvalidKey**: a scalar or curve point could not be parsed
//! - **Encryption**: envelope construction failed (entropy, size bound)
//! - **InvalidPayload**: an envelope field was malformed (hex, length)
//!
//! Struct variants carry the field or key type that failed so callers can
//! report which part of an envelope was rejected. Secret material is never
//! placed in an error message.

use thiserror::Error;

/// Error type for all cryptographic operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// HMAC over `iv ‖ ephemPublicKey ‖ ciphertext` did not verify
    #[error("MAC verification failed: envelope was tampered with or keyed for another session")]
    MacVerification,

    /// Padding check failed after the MAC passed; treated as corruption
    #[error("Invalid padding in decrypted envelope")]
    Padding,

    /// Scalar generation failed
    #[error("Key generation failed: {reason}")]
    KeyGeneration { reason: String },

    /// Scalar or public point could not be used
    #[error("Invalid key ({key_type}): {reason}")]
    InvalidKey {
        /// Which key failed (e.g. "session_private_key", "ephemeral_public_key")
        key_type: String,
        reason: String,
    },

    /// Envelope could not be built
    #[error("Encryption failed: {reason}")]
    Encryption { reason: String },

    /// Envelope field failed validation
    #[error("Invalid envelope field '{field}': {reason}")]
    InvalidPayload { field: String, reason: String },
}

impl CryptoError {
    pub(crate) fn invalid_key(key_type: &str, reason: impl Into<String>) -> Self {
        CryptoError::InvalidKey {
            key_type: key_type.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_payload(field: &str, reason: impl Into<String>) -> Self {
        CryptoError::InvalidPayload {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

// Conversion from k256 errors (elliptic curve operations)
impl From<k256::elliptic_curve::Error> for CryptoError {
    fn from(err: k256::elliptic_curve::Error) -> Self {
        CryptoError::invalid_key("unknown", format!("k256 error: {}", err))
    }
}
