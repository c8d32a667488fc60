// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Encrypted File Secret Store
//!
//! Persists secrets to a single JSON file. Each value is sealed with
//! AES-256-GCM under a key derived from a passphrase with PBKDF2-HMAC-SHA256;
//! the entry name is bound as additional authenticated data so values cannot
//! be swapped between keys.
//!
//! **File Format**:
//! ```text
//! {
//!   "version": 1,
//!   "salt": "<base64, 32 bytes>",
//!   "iterations": 100000,
//!   "check": { "nonce": "<base64>", "ciphertext": "<base64>" },
//!   "entries": { "<key>": { "nonce": "<base64, 12 bytes>", "ciphertext": "<base64>" } }
//! }
//! ```
//!
//! The `check` entry seals a constant and lets [`EncryptedFileStore::open`]
//! reject a wrong passphrase up front.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::error::StoreError;
use super::store::SecretStore;

/// PBKDF2 rounds for newly created stores
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;

const STORE_VERSION: u32 = 1;
const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const CHECK_AAD: &[u8] = b"fabstir-session-store-check";
const CHECK_PLAINTEXT: &[u8] = b"fabstir-session-store";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedValue {
    nonce: String,
    ciphertext: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    salt: String,
    iterations: u32,
    check: SealedValue,
    #[serde(default)]
    entries: BTreeMap<String, SealedValue>,
}

/// Passphrase-protected secret store backed by a JSON file
pub struct EncryptedFileStore {
    path: PathBuf,
    cipher: Aes256Gcm,
    file: Mutex<StoreFile>,
}

impl EncryptedFileStore {
    /// Open `path`, creating a new store if it does not exist
    pub async fn open(path: impl AsRef<Path>, passphrase: &str) -> Result<Self, StoreError> {
        Self::open_with_iterations(path, passphrase, DEFAULT_PBKDF2_ITERATIONS).await
    }

    /// Like [`open`](Self::open); `iterations` only applies to new stores
    pub async fn open_with_iterations(
        path: impl AsRef<Path>,
        passphrase: &str,
        iterations: u32,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            let file: StoreFile = serde_json::from_str(&content)
                .map_err(|e| StoreError::Format(format!("failed to parse store file: {}", e)))?;
            if file.version != STORE_VERSION {
                return Err(StoreError::Format(format!(
                    "unsupported store version {}",
                    file.version
                )));
            }

            let salt = decode_b64("salt", &file.salt)?;
            let cipher = derive_cipher(passphrase, salt, file.iterations).await?;
            let check = open_value(&cipher, &file.check, CHECK_AAD)
                .map_err(|_| StoreError::Decryption("passphrase check".to_string()))?;
            if check.as_slice() != CHECK_PLAINTEXT {
                return Err(StoreError::Decryption("passphrase check".to_string()));
            }

            debug!("Opened encrypted store at {:?} ({} entries)", path, file.entries.len());
            return Ok(Self {
                path,
                cipher,
                file: Mutex::new(file),
            });
        }

        let mut salt = vec![0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let cipher = derive_cipher(passphrase, salt.clone(), iterations).await?;
        let file = StoreFile {
            version: STORE_VERSION,
            salt: STANDARD.encode(&salt),
            iterations,
            check: seal_value(&cipher, CHECK_PLAINTEXT, CHECK_AAD)?,
            entries: BTreeMap::new(),
        };

        write_atomically(&path, &file).await?;
        info!("Created encrypted session store at {:?}", path);

        Ok(Self {
            path,
            cipher,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SecretStore for EncryptedFileStore {
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let sealed = seal_value(&self.cipher, value.as_bytes(), key.as_bytes())?;
        let mut file = self.file.lock().await;
        file.entries.insert(key.to_string(), sealed);
        write_atomically(&self.path, &file).await
    }

    async fn get(&self, key: &str) -> Result<Option<Zeroizing<String>>, StoreError> {
        let file = self.file.lock().await;
        let Some(sealed) = file.entries.get(key) else {
            return Ok(None);
        };

        let mut plaintext = open_value(&self.cipher, sealed, key.as_bytes())?;
        let value = String::from_utf8(std::mem::take(&mut *plaintext))
            .map_err(|_| StoreError::Format(format!("value for '{}' is not UTF-8", key)))?;
        Ok(Some(Zeroizing::new(value)))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut file = self.file.lock().await;
        if file.entries.remove(key).is_some() {
            write_atomically(&self.path, &file).await?;
        }
        Ok(())
    }
}

async fn derive_cipher(passphrase: &str, salt: Vec<u8>, iterations: u32) -> Result<Aes256Gcm, StoreError> {
    if iterations == 0 {
        return Err(StoreError::Format("PBKDF2 iterations must be positive".to_string()));
    }
    let passphrase = Zeroizing::new(passphrase.as_bytes().to_vec());

    let key = tokio::task::spawn_blocking(move || {
        let mut key = Zeroizing::new([0u8; 32]);
        pbkdf2_hmac::<Sha256>(&passphrase, &salt, iterations, key.as_mut_slice());
        key
    })
    .await
    .map_err(|e| StoreError::Encryption(format!("key derivation task failed: {}", e)))?;

    Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|e| StoreError::Encryption(format!("failed to create AES-GCM cipher: {}", e)))
}

fn seal_value(cipher: &Aes256Gcm, plaintext: &[u8], aad: &[u8]) -> Result<SealedValue, StoreError> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| StoreError::Encryption(e.to_string()))?;

    Ok(SealedValue {
        nonce: STANDARD.encode(nonce_bytes),
        ciphertext: STANDARD.encode(ciphertext),
    })
}

fn open_value(cipher: &Aes256Gcm, sealed: &SealedValue, aad: &[u8]) -> Result<Zeroizing<Vec<u8>>, StoreError> {
    let key_name = String::from_utf8_lossy(aad).into_owned();
    let nonce = decode_b64("nonce", &sealed.nonce)?;
    if nonce.len() != NONCE_LEN {
        return Err(StoreError::Format(format!(
            "nonce for '{}' has {} bytes, expected {}",
            key_name,
            nonce.len(),
            NONCE_LEN
        )));
    }
    let ciphertext = decode_b64("ciphertext", &sealed.ciphertext)?;

    cipher
        .decrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &ciphertext,
                aad,
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| StoreError::Decryption(key_name))
}

fn decode_b64(field: &str, value: &str) -> Result<Vec<u8>, StoreError> {
    STANDARD
        .decode(value)
        .map_err(|e| StoreError::Format(format!("invalid base64 in {}: {}", field, e)))
}

async fn write_atomically(path: &Path, file: &StoreFile) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(file)
        .map_err(|e| StoreError::Format(format!("failed to serialize store: {}", e)))?;
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, json).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}
