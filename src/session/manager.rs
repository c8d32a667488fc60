// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Lifecycle
//!
//! Orchestrates create, authorize and invalidate against the session
//! service. Local crypto runs synchronously; each operation then awaits at
//! most one transport round trip.
//!
//! ```text
//! Unestablished --create--> Active --invalidate--> Invalidated
//!                             |
//!                         authorize (read-only resume)
//! ```
//!
//! Operations are not serialized against each other. Callers running
//! `authorize` and `invalidate` for the same session concurrently must order
//! them.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use super::error::{SessionError, TransportError};
use super::reachability::Reachability;
use super::store::{get_non_empty, SecretStore, EPHEM_PUBLIC_KEY_KEY, IV_KEY, MAC_KEY, SESSION_ID_KEY};
use super::transport::SessionTransport;
use super::types::{
    clamp_session_timeout, short_key, SessionRequestBody, SessionState, ShareMetadata, INVALIDATE_TIMEOUT_SECS,
};
use crate::config::SessionConfig;
use crate::crypto::{
    generate_session_key, sign, CiphertextFormat, CryptoEngine, CryptoError, CryptoProvider,
    SessionKeyPair,
};

/// Client side of the encrypted session protocol
pub struct SessionManager {
    store: Arc<dyn SecretStore>,
    transport: Arc<dyn SessionTransport>,
    reachability: Arc<dyn Reachability>,
    engine: CryptoEngine,
    state: RwLock<SessionState>,
}

impl SessionManager {
    /// `config.max_payload_bytes` bounds the payload accepted by [`create`](Self::create)
    pub fn new(
        store: Arc<dyn SecretStore>,
        transport: Arc<dyn SessionTransport>,
        reachability: Arc<dyn Reachability>,
        provider: CryptoProvider,
        config: &SessionConfig,
    ) -> Self {
        let provider = provider.with_max_plaintext_len(config.max_payload_bytes);
        Self {
            store,
            transport,
            reachability,
            engine: CryptoEngine::new(provider),
            state: RwLock::new(SessionState::Unestablished),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub fn engine(&self) -> &CryptoEngine {
        &self.engine
    }

    /// Establish a new session protecting `payload`
    ///
    /// Returns the session id (the session scalar as 64 hex characters),
    /// which has also been written to the secret store.
    pub async fn create(&self, payload: &[u8], requested_timeout_secs: u64) -> Result<Zeroizing<String>, SessionError> {
        self.ensure_reachable().await?;

        let session_key = generate_session_key(self.engine.provider())?;
        let envelope = self.engine.encrypt(session_key.secret(), payload)?;
        let data = envelope.to_json()?;
        let signature = sign(session_key.secret(), &data)?;

        let timeout = clamp_session_timeout(requested_timeout_secs);
        let public_key = session_key.prefixed_public_key();
        let body = SessionRequestBody {
            key: public_key.clone(),
            data,
            signature,
            timeout,
        };

        self.transport.create_session(&body).await.map_err(|e| {
            error!("Session create failed for {}: {}", short_key(&public_key), e);
            SessionError::SessionCreate(e.to_string())
        })?;

        let session_id = session_key.session_id();
        self.store.put(SESSION_ID_KEY, &session_id).await?;
        *self.state.write().await = SessionState::Active {
            public_key: public_key.clone(),
        };

        info!("✅ Session created for {} (timeout={}s)", short_key(&public_key), timeout);
        Ok(session_id)
    }

    /// Fetch and open the envelope stored for `session_id`
    ///
    /// `legacy` selects the big-integer ciphertext encoding used by older
    /// service deployments.
    ///
    /// A service error or an empty reply is [`SessionError::SessionExpired`];
    /// an unreadable reply or envelope is [`SessionError::UserNotFound`]. A
    /// `session_id` that is not a valid scalar fails with
    /// [`SessionError::Crypto`] before the service is contacted.
    pub async fn authorize(&self, session_id: &str, legacy: bool) -> Result<Vec<u8>, SessionError> {
        if session_id.trim().is_empty() {
            return Err(SessionError::SessionIdMissing);
        }
        self.ensure_reachable().await?;

        let session_key = SessionKeyPair::from_session_id(session_id.trim())?;
        let public_key = session_key.prefixed_public_key();

        let response = match self.transport.authorize_session(&public_key).await {
            Ok(response) => response,
            Err(TransportError::Decode(reason)) => {
                warn!("Unreadable authorize response for {}: {}", short_key(&public_key), reason);
                return Err(SessionError::UserNotFound(CryptoError::InvalidPayload {
                    field: "response".to_string(),
                    reason,
                }));
            }
            Err(e) => {
                warn!("Authorize request failed for {}: {}", short_key(&public_key), e);
                return Err(SessionError::SessionExpired);
            }
        };
        let Some(envelope_json) = response.as_ref().and_then(|r| r.envelope_json()) else {
            warn!("No envelope stored for {}", short_key(&public_key));
            return Err(SessionError::SessionExpired);
        };

        let envelope = ShareMetadata::from_json(envelope_json).map_err(|e| {
            SessionError::UserNotFound(CryptoError::InvalidPayload {
                field: "envelope".to_string(),
                reason: e.to_string(),
            })
        })?;

        self.store.put(EPHEM_PUBLIC_KEY_KEY, &envelope.ephem_public_key).await?;
        self.store.put(IV_KEY, &envelope.iv).await?;
        self.store.put(MAC_KEY, &envelope.mac).await?;

        let plaintext = self
            .engine
            .decrypt_with_format(
                session_key.secret(),
                &envelope,
                CiphertextFormat::from_legacy_flag(legacy),
            )
            .map_err(|e| {
                warn!("Envelope for {} could not be opened: {}", short_key(&public_key), e);
                SessionError::UserNotFound(e)
            })?;

        debug!("Session {} authorized ({} bytes)", short_key(&public_key), plaintext.len());
        Ok(plaintext)
    }

    /// [`authorize`](Self::authorize) using the stored session id
    pub async fn authorize_stored(&self, legacy: bool) -> Result<Vec<u8>, SessionError> {
        let session_id = self.stored_session_id().await?.ok_or(SessionError::SessionIdMissing)?;
        self.authorize(&session_id, legacy).await
    }

    /// Ask the service to expire the session
    ///
    /// Returns `Ok(false)` without contacting the service when the envelope
    /// fields cached by a previous `authorize` are missing.
    pub async fn invalidate(&self, session_id: &str) -> Result<bool, SessionError> {
        self.ensure_reachable().await?;

        let store = self.store.as_ref();
        let ephem_public_key = get_non_empty(store, EPHEM_PUBLIC_KEY_KEY).await?;
        let iv = get_non_empty(store, IV_KEY).await?;
        let mac = get_non_empty(store, MAC_KEY).await?;

        let (Some(ephem_public_key), Some(iv), Some(_mac)) = (ephem_public_key, iv, mac) else {
            warn!("Cannot invalidate session: cached envelope fields are missing");
            return Ok(false);
        };
        if session_id.trim().is_empty() {
            warn!("Cannot invalidate session: session id is empty");
            return Ok(false);
        }

        let session_key = SessionKeyPair::from_session_id(session_id.trim())?;
        let envelope = self
            .engine
            .encrypt_with(session_key.secret(), &ephem_public_key, &iv, &[])?;
        let data = envelope.to_json()?;
        let signature = sign(session_key.secret(), &data)?;

        let public_key = session_key.prefixed_public_key();
        let body = SessionRequestBody {
            key: public_key.clone(),
            data,
            signature,
            timeout: INVALIDATE_TIMEOUT_SECS,
        };

        self.transport.invalidate_session(&body).await.map_err(|e| {
            error!("Session invalidation failed for {}: {}", short_key(&public_key), e);
            SessionError::SessionInvalidation(e.to_string())
        })?;

        for key in [SESSION_ID_KEY, EPHEM_PUBLIC_KEY_KEY, IV_KEY, MAC_KEY] {
            self.store.delete(key).await?;
        }
        *self.state.write().await = SessionState::Invalidated;

        info!("🗑️  Session invalidated for {}", short_key(&public_key));
        Ok(true)
    }

    /// [`invalidate`](Self::invalidate) using the stored session id
    pub async fn invalidate_stored(&self) -> Result<bool, SessionError> {
        match self.stored_session_id().await? {
            Some(session_id) => self.invalidate(&session_id).await,
            None => {
                warn!("Cannot invalidate session: no stored session id");
                Ok(false)
            }
        }
    }

    /// Persist a session id obtained elsewhere; empty ids are ignored
    pub async fn save_session_id(&self, session_id: &str) -> Result<(), SessionError> {
        if session_id.trim().is_empty() {
            return Ok(());
        }
        self.store.put(SESSION_ID_KEY, session_id.trim()).await?;
        Ok(())
    }

    pub async fn stored_session_id(&self) -> Result<Option<Zeroizing<String>>, SessionError> {
        Ok(get_non_empty(self.store.as_ref(), SESSION_ID_KEY).await?)
    }

    async fn ensure_reachable(&self) -> Result<(), SessionError> {
        if self.reachability.is_reachable().await {
            Ok(())
        } else {
            warn!("Session service is not reachable");
            Err(SessionError::NetworkUnavailable)
        }
    }
}
