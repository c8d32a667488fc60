// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Key Derivation
//!
//! secp256k1 key pairs for sessions and per-envelope ephemeral keys.
//!
//! Public keys are rendered as the uncompressed point `x ‖ y`, 128 lower-case
//! hex characters, *without* the SEC1 `04` tag. The remote protocol expects
//! callers to prepend a literal `"04"` (see [`with_uncompressed_prefix`]).
//!
//! A session id is the session scalar as 64 lower-case hex characters.

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{FieldBytes, PublicKey, SecretKey};
use zeroize::Zeroizing;

use super::error::CryptoError;
use super::provider::CryptoProvider;

/// SEC1 tag for an uncompressed point
pub const UNCOMPRESSED_PREFIX: &str = "04";

/// Draws above the curve order are rejected; the chance of needing even a
/// second draw is about 2^-128.
const MAX_SCALAR_DRAWS: usize = 8;

/// secp256k1 key pair. The public half is always derived from the scalar.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public_key: String,
}

/// Long-lived key identifying a session
pub type SessionKeyPair = KeyPair;

/// One-shot key generated per envelope and dropped once it is built
pub type EphemeralKeyPair = KeyPair;

impl KeyPair {
    fn from_secret(secret: SecretKey) -> Self {
        let public_key = encode_public_key(&secret.public_key());
        Self { secret, public_key }
    }

    /// Rebuild a key pair from a stored session id
    ///
    /// Accepts shorter hex strings (big-integer encodings drop leading zeros)
    /// and left-pads them to 32 bytes.
    pub fn from_session_id(session_id: &str) -> Result<Self, CryptoError> {
        Ok(Self::from_secret(parse_scalar(session_id)?))
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    /// Uncompressed public key hex without the `04` tag
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Public key hex with the `04` tag, as sent on the wire
    pub fn prefixed_public_key(&self) -> String {
        with_uncompressed_prefix(&self.public_key)
    }

    /// The scalar as 64 hex characters
    pub fn session_id(&self) -> Zeroizing<String> {
        let mut bytes = Zeroizing::new([0u8; 32]);
        bytes.copy_from_slice(&self.secret.to_bytes());
        Zeroizing::new(hex::encode(bytes.as_slice()))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Generate a fresh session key from the provider's entropy source
pub fn generate_session_key(provider: &CryptoProvider) -> Result<SessionKeyPair, CryptoError> {
    draw_key_pair(provider)
}

/// Generate a one-time key for an envelope
pub fn generate_ephemeral_key(provider: &CryptoProvider) -> Result<EphemeralKeyPair, CryptoError> {
    draw_key_pair(provider)
}

fn draw_key_pair(provider: &CryptoProvider) -> Result<KeyPair, CryptoError> {
    let mut bytes = Zeroizing::new([0u8; 32]);
    for _ in 0..MAX_SCALAR_DRAWS {
        provider
            .fill(bytes.as_mut_slice())
            .map_err(|e| CryptoError::KeyGeneration {
                reason: format!("entropy source unavailable: {}", e),
            })?;

        // Rejects zero and values >= n
        if let Ok(secret) = SecretKey::from_bytes(FieldBytes::from_slice(bytes.as_slice())) {
            return Ok(KeyPair::from_secret(secret));
        }
    }

    Err(CryptoError::KeyGeneration {
        reason: format!("no valid scalar after {} draws", MAX_SCALAR_DRAWS),
    })
}

/// Derive the uncompressed public key hex (no `04` tag) for a hex scalar
pub fn public_key_of(private_scalar_hex: &str) -> Result<String, CryptoError> {
    let secret = parse_scalar(private_scalar_hex)?;
    Ok(encode_public_key(&secret.public_key()))
}

/// Prepend the literal `"04"` uncompressed-point tag
pub fn with_uncompressed_prefix(public_key_hex: &str) -> String {
    format!("{}{}", UNCOMPRESSED_PREFIX, public_key_hex)
}

/// Parse a hex scalar into a secret key
pub(crate) fn parse_scalar(private_scalar_hex: &str) -> Result<SecretKey, CryptoError> {
    let trimmed = private_scalar_hex.trim();
    if trimmed.is_empty() {
        return Err(CryptoError::invalid_key("session_private_key", "empty scalar"));
    }
    if trimmed.len() > 64 {
        return Err(CryptoError::invalid_key(
            "session_private_key",
            format!("expected at most 64 hex characters, got {}", trimmed.len()),
        ));
    }

    let padded = Zeroizing::new(format!("{:0>64}", trimmed));
    let mut bytes = Zeroizing::new([0u8; 32]);
    hex::decode_to_slice(padded.as_str(), bytes.as_mut_slice()).map_err(|e| {
        CryptoError::invalid_key("session_private_key", format!("hex decode error: {}", e))
    })?;

    SecretKey::from_bytes(FieldBytes::from_slice(bytes.as_slice())).map_err(|_| {
        CryptoError::invalid_key("session_private_key", "scalar is zero or exceeds curve order")
    })
}

/// Parse a public key given as hex, with or without the `04` tag
pub(crate) fn parse_public_key(public_key_hex: &str, key_type: &str) -> Result<PublicKey, CryptoError> {
    let bytes = decode_public_key_bytes(public_key_hex, key_type)?;
    PublicKey::from_sec1_bytes(&bytes)
        .map_err(|_| CryptoError::invalid_key(key_type, "not a valid secp256k1 point"))
}

/// SEC1 uncompressed bytes (65, with tag) for a hex key with or without tag
pub(crate) fn decode_public_key_bytes(
    public_key_hex: &str,
    key_type: &str,
) -> Result<Vec<u8>, CryptoError> {
    let hex_str = match public_key_hex.len() {
        130 => public_key_hex.to_string(),
        128 => with_uncompressed_prefix(public_key_hex),
        other => {
            return Err(CryptoError::invalid_key(
                key_type,
                format!("expected 128 or 130 hex characters, got {}", other),
            ))
        }
    };

    let bytes = hex::decode(&hex_str)
        .map_err(|e| CryptoError::invalid_key(key_type, format!("hex decode error: {}", e)))?;
    if bytes[0] != 0x04 {
        return Err(CryptoError::invalid_key(
            key_type,
            format!("expected uncompressed tag 0x04, got 0x{:02x}", bytes[0]),
        ));
    }
    Ok(bytes)
}

fn encode_public_key(public_key: &PublicKey) -> String {
    let point = public_key.to_encoded_point(false);
    // Skip the 0x04 tag byte
    hex::encode(&point.as_bytes()[1..])
}
