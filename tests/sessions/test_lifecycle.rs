// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session lifecycle tests: create → authorize → invalidate

use super::common::{build_manager, online_manager, SpyTransport};
use fabstir_session_manager::crypto::{
    verify, CryptoEngine, CryptoError, CryptoProvider, SessionKeyPair,
};
use fabstir_session_manager::session::{
    MemorySecretStore, SecretStore, SessionError, SessionState, ShareMetadata, StaticReachability,
    EPHEM_PUBLIC_KEY_KEY, IV_KEY, MAC_KEY, SESSION_ID_KEY,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn test_create_then_authorize_yields_payload() {
    let transport = Arc::new(SpyTransport::echoing());
    let manager = online_manager(transport.clone(), MemorySecretStore::new());

    let session_id = manager.create(b"abc", 3600).await.unwrap();
    assert_eq!(session_id.len(), 64);
    assert!(session_id.chars().all(|c| c.is_ascii_hexdigit()));

    let share = manager.authorize(&session_id, false).await.unwrap();
    assert_eq!(share, b"abc");
}

#[tokio::test]
async fn test_authorize_envelope_built_independently() {
    // Envelope produced outside the manager for a known session id
    let session_id = "3b".repeat(32);
    let key = SessionKeyPair::from_session_id(&session_id).unwrap();
    let envelope = CryptoEngine::new(CryptoProvider::system())
        .encrypt(key.secret(), b"abc")
        .unwrap();

    let transport = Arc::new(SpyTransport::returning(&envelope.to_json().unwrap()));
    let store = MemorySecretStore::new();
    let manager = online_manager(transport.clone(), store.clone());

    let share = manager.authorize(&session_id, false).await.unwrap();
    assert_eq!(share, b"abc");

    // Fetched by the 04-tagged public key
    let requested = transport.requested_keys.lock().unwrap().clone();
    assert_eq!(requested, vec![key.prefixed_public_key()]);

    // Envelope fields cached for invalidate
    assert_eq!(
        store.get(EPHEM_PUBLIC_KEY_KEY).await.unwrap().unwrap().as_str(),
        envelope.ephem_public_key
    );
    assert_eq!(store.get(IV_KEY).await.unwrap().unwrap().as_str(), envelope.iv);
    assert_eq!(store.get(MAC_KEY).await.unwrap().unwrap().as_str(), envelope.mac);
}

#[tokio::test]
async fn test_create_request_body() {
    let transport = Arc::new(SpyTransport::default());
    let manager = online_manager(transport.clone(), MemorySecretStore::new());

    let session_id = manager.create(b"abc", 10).await.unwrap();
    let body = transport.last_submitted().unwrap();
    let key = SessionKeyPair::from_session_id(&session_id).unwrap();

    assert_eq!(body.timeout, 10);
    assert_eq!(body.key, key.prefixed_public_key());
    assert!(verify(&body.key, &body.data, &body.signature));

    let envelope = ShareMetadata::from_json(&body.data).unwrap();
    let engine = CryptoEngine::new(CryptoProvider::system());
    assert_eq!(engine.decrypt(key.secret(), &envelope).unwrap(), b"abc");

    assert_eq!(
        manager.state().await,
        SessionState::Active {
            public_key: key.prefixed_public_key()
        }
    );
}

#[tokio::test]
async fn test_create_clamps_timeout() {
    let transport = Arc::new(SpyTransport::default());
    let manager = online_manager(transport.clone(), MemorySecretStore::new());

    manager.create(b"abc", 99_999_999).await.unwrap();
    assert_eq!(transport.last_submitted().unwrap().timeout, 604_800);
}

#[tokio::test]
async fn test_create_failure_persists_nothing() {
    let transport = Arc::new(SpyTransport {
        fail_create: true,
        ..SpyTransport::default()
    });
    let store = MemorySecretStore::new();
    let manager = online_manager(transport.clone(), store.clone());

    let result = manager.create(b"abc", 3600).await;
    assert!(matches!(result, Err(SessionError::SessionCreate(_))));
    assert_eq!(transport.create_calls.load(Ordering::SeqCst), 1);
    assert!(!store.contains(SESSION_ID_KEY).await);
}

#[tokio::test]
async fn test_offline_operations_fail_fast() {
    let transport = Arc::new(SpyTransport::echoing());
    let reachability = Arc::new(StaticReachability::offline());
    let manager = build_manager(transport.clone(), MemorySecretStore::new(), reachability.clone());

    assert!(matches!(
        manager.create(b"abc", 3600).await,
        Err(SessionError::NetworkUnavailable)
    ));
    assert!(matches!(
        manager.authorize(&"01".repeat(32), false).await,
        Err(SessionError::NetworkUnavailable)
    ));
    assert!(matches!(
        manager.invalidate(&"01".repeat(32)).await,
        Err(SessionError::NetworkUnavailable)
    ));
    assert_eq!(transport.total_calls(), 0);

    // Comes back online
    reachability.set(true);
    assert!(manager.create(b"abc", 3600).await.is_ok());
}

#[tokio::test]
async fn test_authorize_empty_id_makes_no_calls() {
    let transport = Arc::new(SpyTransport::echoing());
    let manager = online_manager(transport.clone(), MemorySecretStore::new());

    let result = manager.authorize("", false).await;
    assert!(matches!(result, Err(SessionError::SessionIdMissing)));
    assert_eq!(transport.total_calls(), 0);
}

#[tokio::test]
async fn test_authorize_unknown_session_is_expired() {
    let transport = Arc::new(SpyTransport::default());
    let manager = online_manager(transport.clone(), MemorySecretStore::new());

    let result = manager.authorize(&"0c".repeat(32), false).await;
    assert!(matches!(result, Err(SessionError::SessionExpired)));
    assert_eq!(transport.authorize_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_authorize_with_wrong_key_is_user_not_found() {
    let transport = Arc::new(SpyTransport::echoing());
    let manager = online_manager(transport.clone(), MemorySecretStore::new());
    manager.create(b"abc", 3600).await.unwrap();

    // The spy serves the same envelope to any key
    let result = manager.authorize(&"0d".repeat(32), false).await;
    assert!(matches!(
        result,
        Err(SessionError::UserNotFound(CryptoError::MacVerification))
    ));
}

#[tokio::test]
async fn test_authorize_legacy_envelope() {
    let session_id = "4e".repeat(32);
    let key = SessionKeyPair::from_session_id(&session_id).unwrap();
    let engine = CryptoEngine::new(CryptoProvider::system());

    // Find an envelope whose ciphertext starts with a zero digit
    let mut envelope = engine.encrypt(key.secret(), b"legacy").unwrap();
    for _ in 0..2000 {
        if envelope.ciphertext.starts_with('0') {
            break;
        }
        envelope = engine.encrypt(key.secret(), b"legacy").unwrap();
    }
    assert!(envelope.ciphertext.starts_with('0'));
    envelope.ciphertext = envelope.ciphertext.trim_start_matches('0').to_string();

    let transport = Arc::new(SpyTransport::returning(&envelope.to_json().unwrap()));
    let manager = online_manager(transport, MemorySecretStore::new());

    assert!(matches!(
        manager.authorize(&session_id, false).await,
        Err(SessionError::UserNotFound(_))
    ));
    assert_eq!(manager.authorize(&session_id, true).await.unwrap(), b"legacy");
}

#[tokio::test]
async fn test_authorize_stored_uses_saved_id() {
    let transport = Arc::new(SpyTransport::echoing());
    let manager = online_manager(transport, MemorySecretStore::new());

    assert!(matches!(
        manager.authorize_stored(false).await,
        Err(SessionError::SessionIdMissing)
    ));

    manager.create(b"stored", 3600).await.unwrap();
    assert_eq!(manager.authorize_stored(false).await.unwrap(), b"stored");
}

#[tokio::test]
async fn test_invalidate_without_mac_returns_false() {
    let transport = Arc::new(SpyTransport::default());
    let store = MemorySecretStore::new();
    store.put(EPHEM_PUBLIC_KEY_KEY, &format!("04{}", "ab".repeat(64))).await.unwrap();
    store.put(IV_KEY, &"00".repeat(16)).await.unwrap();

    let manager = online_manager(transport.clone(), store);
    assert!(!manager.invalidate(&"01".repeat(32)).await.unwrap());
    assert_eq!(transport.total_calls(), 0);
}

#[tokio::test]
async fn test_full_lifecycle() {
    let transport = Arc::new(SpyTransport::echoing());
    let store = MemorySecretStore::new();
    let manager = online_manager(transport.clone(), store.clone());

    let session_id = manager.create(b"abc", 3600).await.unwrap();
    manager.authorize(&session_id, false).await.unwrap();

    assert!(manager.invalidate(&session_id).await.unwrap());

    let body = transport.last_submitted().unwrap();
    assert_eq!(body.timeout, 1);
    assert!(verify(&body.key, &body.data, &body.signature));

    // Empty share under the cached ephemeral key and iv
    let envelope = ShareMetadata::from_json(&body.data).unwrap();
    let key = SessionKeyPair::from_session_id(&session_id).unwrap();
    let engine = CryptoEngine::new(CryptoProvider::system());
    assert!(engine.decrypt(key.secret(), &envelope).unwrap().is_empty());

    // Local state cleared only after the service accepted
    assert!(!store.contains(SESSION_ID_KEY).await);
    assert!(!store.contains(MAC_KEY).await);
    assert_eq!(manager.state().await, SessionState::Invalidated);

    // Service no longer knows the session
    assert!(matches!(
        manager.authorize(&session_id, false).await,
        Err(SessionError::SessionExpired)
    ));
}

#[tokio::test]
async fn test_invalidate_failure_keeps_local_state() {
    let transport = Arc::new(SpyTransport {
        echo_created: true,
        fail_invalidate: true,
        ..SpyTransport::default()
    });
    let store = MemorySecretStore::new();
    let manager = online_manager(transport.clone(), store.clone());

    let session_id = manager.create(b"abc", 3600).await.unwrap();
    manager.authorize(&session_id, false).await.unwrap();

    let result = manager.invalidate(&session_id).await;
    assert!(matches!(result, Err(SessionError::SessionInvalidation(_))));
    assert_eq!(
        manager.stored_session_id().await.unwrap().unwrap().as_str(),
        session_id.as_str()
    );
    assert!(store.contains(MAC_KEY).await);
}
