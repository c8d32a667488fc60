// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECDSA Request Signing
//!
//! Every request sent to the session service is signed with the session
//! scalar. The message is hashed with Keccak-256 (Ethereum-style "sha3"),
//! signed over secp256k1 with RFC 6979 deterministic nonces, and sent as the
//! lower-case hex of the DER-encoded `(r, s)` pair.
//!
//! Signatures are low-S normalized, so the same `(scalar, message)` always
//! produces the same bytes.

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::SecretKey;
use tiny_keccak::{Hasher, Keccak};

use super::error::CryptoError;
use super::keys::parse_public_key;

/// Keccak-256 digest of a UTF-8 message
pub fn keccak256(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut hash = [0u8; 32];
    hasher.update(message);
    hasher.finalize(&mut hash);
    hash
}

/// Sign `message` with the session scalar
///
/// # Returns
///
/// Lower-case hex of the DER-encoded signature
///
/// # Example
///
/// ```ignore
/// let signature = sign(session.secret(), &envelope_json)?;
/// assert!(verify(session.public_key(), &envelope_json, &signature));
/// ```
pub fn sign(private_key: &SecretKey, message: &str) -> Result<String, CryptoError> {
    let digest = keccak256(message.as_bytes());
    let signing_key = SigningKey::from(private_key);

    let signature: Signature = signing_key
        .sign_prehash(&digest)
        .map_err(|e| CryptoError::invalid_key("session_private_key", format!("signing failed: {}", e)))?;

    Ok(hex::encode(signature.to_der().as_bytes()))
}

/// Check a hex DER signature against a public key (with or without `04` tag)
///
/// Malformed keys or signatures verify as `false`.
pub fn verify(public_key_hex: &str, message: &str, signature_hex: &str) -> bool {
    let public_key = match parse_public_key(public_key_hex, "session_public_key") {
        Ok(key) => key,
        Err(_) => return false,
    };
    let der = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let signature = match Signature::from_der(&der) {
        Ok(sig) => sig,
        Err(_) => return false,
    };

    let verifying_key = VerifyingKey::from(&public_key);
    let digest = keccak256(message.as_bytes());
    verifying_key.verify_prehash(&digest, &signature).is_ok()
}
