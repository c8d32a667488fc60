// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Secret Store
//!
//! Key-value storage for the session id and the cached envelope fields that
//! `invalidate` needs. Confidentiality at rest is the store's concern; the
//! session core only calls `put`, `get` and `delete`.
//!
//! **Security**: values are returned wrapped in [`Zeroizing`] and are never
//! logged. Only key names appear in traces.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use zeroize::Zeroizing;

use super::error::StoreError;

/// Session scalar (hex)
pub const SESSION_ID_KEY: &str = "sessionId";
/// Ephemeral public key of the last fetched envelope
pub const EPHEM_PUBLIC_KEY_KEY: &str = "ephemPublicKey";
/// IV of the last fetched envelope
pub const IV_KEY: &str = "ivKey";
/// MAC of the last fetched envelope
pub const MAC_KEY: &str = "mac";

/// Confidentiality-protected key-value store
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn get(&self, key: &str) -> Result<Option<Zeroizing<String>>, StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory secret store
///
/// Thread-safe and cheap to clone; clones share the same map. Nothing is
/// persisted, so sessions do not survive a restart.
///
/// # Example
///
/// ```ignore
/// let store = MemorySecretStore::new();
/// store.put(SESSION_ID_KEY, &session_id).await?;
/// let id = store.get(SESSION_ID_KEY).await?;
/// store.delete(SESSION_ID_KEY).await?;
/// ```
#[derive(Clone, Default)]
pub struct MemorySecretStore {
    values: Arc<RwLock<HashMap<String, Zeroizing<String>>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub async fn count(&self) -> usize {
        self.values.read().await.len()
    }

    /// Whether `key` holds a value
    pub async fn contains(&self, key: &str) -> bool {
        self.values.read().await.contains_key(key)
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.write().await;
        values.insert(key.to_string(), Zeroizing::new(value.to_string()));
        tracing::debug!("🔑 Stored secret '{}' (total entries: {})", key, values.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Zeroizing<String>>, StoreError> {
        let values = self.values.read().await;
        Ok(values.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.write().await;
        if values.remove(key).is_some() {
            tracing::debug!("🗑️  Deleted secret '{}' (remaining: {})", key, values.len());
        }
        Ok(())
    }
}

/// Read a value, treating empty strings as absent
pub(crate) async fn get_non_empty(
    store: &dyn SecretStore,
    key: &str,
) -> Result<Option<Zeroizing<String>>, StoreError> {
    Ok(store.get(key).await?.filter(|v| !v.trim().is_empty()))
}
