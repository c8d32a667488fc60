// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Crypto Module
//!
//! Cryptographic primitives behind the session protocol:
//!
//! - **Keys**: secp256k1 session and ephemeral key pairs
//! - **ECIES**: ECDH + SHA-512 key split + AES-256-CBC + HMAC-SHA256 envelopes
//! - **Signature**: Keccak-256 / ECDSA (RFC 6979) request signatures
//! - **Provider**: injected entropy source shared by the above
//!
//! ## Security Considerations
//!
//! - Session scalars are zeroized on drop and never logged
//! - Envelope MACs are verified in constant time before decryption
//! - Nonces for signatures are deterministic, so no nonce reuse is possible
//!
//! ## Protocol Flow
//!
//! 1. Client generates a session key pair
//! 2. Client encrypts the share to its own session public key
//! 3. Client signs the serialized envelope with the session scalar
//! 4. Service stores the envelope under the session public key
//! 5. On resume, client fetches the envelope and decrypts it with the scalar

pub mod ecies;
pub mod error;
pub mod keys;
pub mod provider;
pub mod signature;

pub use ecies::{CiphertextFormat, CryptoEngine, ShareMetadata, IV_LEN, MAC_LEN};
pub use error::CryptoError;
pub use keys::{
    generate_ephemeral_key, generate_session_key, public_key_of, with_uncompressed_prefix,
    EphemeralKeyPair, KeyPair, SessionKeyPair, UNCOMPRESSED_PREFIX,
};
pub use provider::{CryptoProvider, EntropySource, OsEntropy, SeededEntropy};
pub use signature::{keccak256, sign, verify};
