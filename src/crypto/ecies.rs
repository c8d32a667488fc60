// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECIES Envelope Encryption
//!
//! Encrypts share payloads into a [`ShareMetadata`] envelope addressed to a
//! secp256k1 key, and opens such envelopes with the matching private scalar.
//!
//! ## Construction
//!
//! ```text
//! shared   = x-coordinate of ECDH(ephemeral, recipient)   (leading zero bytes stripped)
//! h        = SHA-512(shared)
//! encKey   = h[0..32]
//! macKey   = h[32..64]
//! ct       = AES-256-CBC/PKCS#7(encKey, iv, plaintext)
//! mac      = HMAC-SHA256(macKey, iv ‖ ephemPublicKey ‖ ct)
//! ```
//!
//! ECDH is symmetric, so the recipient recomputes `shared` from its own scalar
//! and the envelope's ephemeral public key.
//!
//! ## Security Considerations
//!
//! - The MAC is checked in constant time before the cipher is touched
//! - Ephemeral private keys never leave [`CryptoEngine::encrypt`]
//! - Derived symmetric keys are zeroized on drop

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use k256::{PublicKey, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::error::CryptoError;
use super::keys::{decode_public_key_bytes, generate_ephemeral_key, parse_public_key};
use super::provider::CryptoProvider;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// AES block size, also the IV length
pub const IV_LEN: usize = 16;

/// HMAC-SHA256 tag length
pub const MAC_LEN: usize = 32;

/// Encrypted-and-authenticated share envelope
///
/// All fields are lower-case hex. Field order matches the remote protocol's
/// JSON encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareMetadata {
    /// 16-byte CBC initialization vector
    pub iv: String,
    /// Ephemeral public key, `04`-tagged uncompressed point
    pub ephem_public_key: String,
    /// AES-256-CBC ciphertext
    pub ciphertext: String,
    /// HMAC-SHA256 over `iv ‖ ephemPublicKey ‖ ciphertext`
    pub mac: String,
}

impl ShareMetadata {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// How the `ciphertext` field of an envelope is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CiphertextFormat {
    /// Plain hex of the ciphertext bytes
    #[default]
    Hex,
    /// Hex of the ciphertext read as an unsigned big integer. Leading zero
    /// bytes are lost and the string may have odd length.
    Legacy,
}

impl CiphertextFormat {
    pub fn from_legacy_flag(is_legacy: bool) -> Self {
        if is_legacy {
            CiphertextFormat::Legacy
        } else {
            CiphertextFormat::Hex
        }
    }
}

struct EnvelopeKeys {
    enc_key: Zeroizing<[u8; 32]>,
    mac_key: Zeroizing<[u8; 32]>,
}

/// ECIES envelope engine
#[derive(Debug, Clone)]
pub struct CryptoEngine {
    provider: CryptoProvider,
}

impl CryptoEngine {
    pub fn new(provider: CryptoProvider) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &CryptoProvider {
        &self.provider
    }

    /// Encrypt `plaintext` to the public key of `recipient` under a fresh
    /// ephemeral key and IV
    pub fn encrypt(&self, recipient: &SecretKey, plaintext: &[u8]) -> Result<ShareMetadata, CryptoError> {
        self.check_plaintext_len(plaintext)?;

        let ephemeral = generate_ephemeral_key(&self.provider).map_err(|e| CryptoError::Encryption {
            reason: e.to_string(),
        })?;

        let mut iv = [0u8; IV_LEN];
        self.provider
            .fill(&mut iv)
            .map_err(|e| CryptoError::Encryption {
                reason: format!("failed to draw IV: {}", e),
            })?;

        let keys = derive_envelope_keys(ephemeral.secret(), &recipient.public_key());
        let ephem_bytes =
            decode_public_key_bytes(&ephemeral.prefixed_public_key(), "ephemeral_public_key")?;

        seal(&keys, &iv, &ephem_bytes, plaintext)
    }

    /// Encrypt `plaintext` reusing an existing ephemeral public key and IV
    ///
    /// The shared secret is computed from `local` and `ephem_public_key_hex`,
    /// which equals the secret the original sender derived.
    pub fn encrypt_with(
        &self,
        local: &SecretKey,
        ephem_public_key_hex: &str,
        iv_hex: &str,
        plaintext: &[u8],
    ) -> Result<ShareMetadata, CryptoError> {
        self.check_plaintext_len(plaintext)?;

        let ephem_bytes = decode_public_key_bytes(ephem_public_key_hex, "ephemeral_public_key")?;
        let ephemeral = parse_public_key(ephem_public_key_hex, "ephemeral_public_key")?;
        let iv = decode_iv(iv_hex)?;

        let keys = derive_envelope_keys(local, &ephemeral);
        seal(&keys, &iv, &ephem_bytes, plaintext)
    }

    /// Open an envelope whose ciphertext is plain hex
    pub fn decrypt(&self, local: &SecretKey, metadata: &ShareMetadata) -> Result<Vec<u8>, CryptoError> {
        self.decrypt_with_format(local, metadata, CiphertextFormat::Hex)
    }

    /// Open an envelope, reading the ciphertext in the given format
    pub fn decrypt_with_format(
        &self,
        local: &SecretKey,
        metadata: &ShareMetadata,
        format: CiphertextFormat,
    ) -> Result<Vec<u8>, CryptoError> {
        let iv = decode_iv(&metadata.iv)?;
        let ephem_bytes = decode_envelope_public_key(&metadata.ephem_public_key)?;
        // A bad tag or off-curve point cannot be the key covered by the MAC
        let ephemeral =
            PublicKey::from_sec1_bytes(&ephem_bytes).map_err(|_| CryptoError::MacVerification)?;

        let ciphertext = match format {
            CiphertextFormat::Hex => hex::decode(metadata.ciphertext.trim())
                .map_err(|e| CryptoError::invalid_payload("ciphertext", format!("hex decode error: {}", e)))?,
            CiphertextFormat::Legacy => decode_legacy_ciphertext(&metadata.ciphertext)?,
        };
        let provided_mac = hex::decode(metadata.mac.trim())
            .map_err(|e| CryptoError::invalid_payload("mac", format!("hex decode error: {}", e)))?;

        let keys = derive_envelope_keys(local, &ephemeral);
        let expected_mac = compute_mac(&keys.mac_key, &iv, &ephem_bytes, &ciphertext)?;
        if !bool::from(expected_mac.as_slice().ct_eq(provided_mac.as_slice())) {
            return Err(CryptoError::MacVerification);
        }

        Aes256CbcDec::new_from_slices(keys.enc_key.as_slice(), &iv)
            .map_err(|e| CryptoError::invalid_key("envelope_encryption_key", e.to_string()))?
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CryptoError::Padding)
    }

    fn check_plaintext_len(&self, plaintext: &[u8]) -> Result<(), CryptoError> {
        let max = self.provider.max_plaintext_len();
        if plaintext.len() > max {
            return Err(CryptoError::Encryption {
                reason: format!(
                    "plaintext too large: {} bytes exceeds limit of {} bytes",
                    plaintext.len(),
                    max
                ),
            });
        }
        Ok(())
    }
}

fn derive_envelope_keys(secret: &SecretKey, peer: &PublicKey) -> EnvelopeKeys {
    let shared = k256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
    let x = shared.raw_secret_bytes();

    // Big-integer encoding of x: no leading zero bytes
    let start = x.iter().position(|b| *b != 0).unwrap_or(x.len() - 1);

    let mut digest = Zeroizing::new([0u8; 64]);
    digest.copy_from_slice(&Sha512::digest(&x[start..]));

    let mut enc_key = Zeroizing::new([0u8; 32]);
    let mut mac_key = Zeroizing::new([0u8; 32]);
    enc_key.copy_from_slice(&digest[..32]);
    mac_key.copy_from_slice(&digest[32..]);

    EnvelopeKeys { enc_key, mac_key }
}

fn seal(
    keys: &EnvelopeKeys,
    iv: &[u8; IV_LEN],
    ephem_bytes: &[u8],
    plaintext: &[u8],
) -> Result<ShareMetadata, CryptoError> {
    let ciphertext = Aes256CbcEnc::new_from_slices(keys.enc_key.as_slice(), iv)
        .map_err(|e| CryptoError::Encryption {
            reason: format!("cipher init failed: {}", e),
        })?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mac = compute_mac(&keys.mac_key, iv, ephem_bytes, &ciphertext)?;

    Ok(ShareMetadata {
        iv: hex::encode(iv),
        ephem_public_key: hex::encode(ephem_bytes),
        ciphertext: hex::encode(&ciphertext),
        mac: hex::encode(mac),
    })
}

fn compute_mac(
    mac_key: &[u8; 32],
    iv: &[u8],
    ephem_bytes: &[u8],
    ciphertext: &[u8],
) -> Result<[u8; MAC_LEN], CryptoError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key)
        .map_err(|e| CryptoError::invalid_key("envelope_mac_key", e.to_string()))?;
    mac.update(iv);
    mac.update(ephem_bytes);
    mac.update(ciphertext);
    Ok(mac.finalize().into_bytes().into())
}

fn decode_iv(iv_hex: &str) -> Result<[u8; IV_LEN], CryptoError> {
    let bytes = hex::decode(iv_hex.trim())
        .map_err(|e| CryptoError::invalid_payload("iv", format!("hex decode error: {}", e)))?;
    bytes.as_slice().try_into().map_err(|_| {
        CryptoError::invalid_payload(
            "iv",
            format!("expected {} bytes, got {}", IV_LEN, bytes.len()),
        )
    })
}

/// Raw SEC1 bytes of the envelope's ephemeral key, tag included
fn decode_envelope_public_key(ephem_public_key_hex: &str) -> Result<Vec<u8>, CryptoError> {
    let mut bytes = hex::decode(ephem_public_key_hex.trim()).map_err(|e| {
        CryptoError::invalid_key("ephemeral_public_key", format!("hex decode error: {}", e))
    })?;
    if bytes.len() == 64 {
        bytes.insert(0, 0x04);
    }
    if bytes.len() != 65 {
        return Err(CryptoError::invalid_key(
            "ephemeral_public_key",
            format!("expected 65 bytes, got {}", bytes.len()),
        ));
    }
    Ok(bytes)
}

/// Re-encode a big-integer hex ciphertext as block-aligned bytes
fn decode_legacy_ciphertext(encoded: &str) -> Result<Vec<u8>, CryptoError> {
    let digits = encoded.trim().trim_start_matches('0');
    if digits.is_empty() {
        return Err(CryptoError::invalid_payload(
            "ciphertext",
            "legacy ciphertext is zero or empty",
        ));
    }

    let even = if digits.len() % 2 == 1 {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };
    let bytes = hex::decode(&even)
        .map_err(|e| CryptoError::invalid_payload("ciphertext", format!("hex decode error: {}", e)))?;

    let remainder = bytes.len() % IV_LEN;
    if remainder == 0 {
        return Ok(bytes);
    }
    let mut aligned = vec![0u8; IV_LEN - remainder];
    aligned.extend_from_slice(&bytes);
    Ok(aligned)
}
