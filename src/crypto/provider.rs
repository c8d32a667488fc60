// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Crypto Provider
//!
//! Owns the entropy source used by key derivation and envelope encryption.
//! A provider is built once at process start and handed to the components
//! that need randomness; nothing in this crate reaches for a global RNG.

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use std::sync::{Arc, Mutex};

/// Default upper bound on envelope plaintext size (1 MiB)
pub const DEFAULT_MAX_PLAINTEXT_LEN: usize = 1024 * 1024;

/// Source of cryptographically secure random bytes
pub trait EntropySource: Send + Sync {
    fn try_fill(&self, dest: &mut [u8]) -> Result<(), rand::Error>;
}

/// Operating system CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn try_fill(&self, dest: &mut [u8]) -> Result<(), rand::Error> {
        OsRng.try_fill_bytes(dest)
    }
}

/// Seeded generator for reproducible test vectors. Not for production keys.
pub struct SeededEntropy {
    rng: Mutex<StdRng>,
}

impl SeededEntropy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl EntropySource for SeededEntropy {
    fn try_fill(&self, dest: &mut [u8]) -> Result<(), rand::Error> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| rand::Error::new("seeded entropy lock poisoned"))?;
        rng.try_fill_bytes(dest)
    }
}

/// Explicitly constructed crypto context
#[derive(Clone)]
pub struct CryptoProvider {
    entropy: Arc<dyn EntropySource>,
    max_plaintext_len: usize,
}

impl CryptoProvider {
    pub fn new(entropy: Arc<dyn EntropySource>) -> Self {
        Self {
            entropy,
            max_plaintext_len: DEFAULT_MAX_PLAINTEXT_LEN,
        }
    }

    /// Provider backed by the operating system RNG
    pub fn system() -> Self {
        Self::new(Arc::new(OsEntropy))
    }

    pub fn with_max_plaintext_len(mut self, max_plaintext_len: usize) -> Self {
        self.max_plaintext_len = max_plaintext_len;
        self
    }

    pub fn max_plaintext_len(&self) -> usize {
        self.max_plaintext_len
    }

    pub fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.entropy.try_fill(dest)
    }
}

impl std::fmt::Debug for CryptoProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoProvider")
            .field("max_plaintext_len", &self.max_plaintext_len)
            .finish_non_exhaustive()
    }
}
