// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP transport tests against a local stub session service

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use fabstir_session_manager::config::SessionConfig;
use fabstir_session_manager::crypto::{CryptoError, CryptoProvider};
use fabstir_session_manager::session::{
    HttpTransport, MemorySecretStore, SessionError, SessionManager, SessionRequestBody,
    SessionTransport, StaticReachability, TcpReachability, TransportError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct StubService {
    envelopes: Arc<Mutex<HashMap<String, String>>>,
    requests: Arc<Mutex<Vec<SessionRequestBody>>>,
}

async fn post_session(
    State(service): State<StubService>,
    Json(body): Json<SessionRequestBody>,
) -> StatusCode {
    service.requests.lock().unwrap().push(body.clone());
    let mut envelopes = service.envelopes.lock().unwrap();
    if body.timeout <= 1 {
        envelopes.remove(&body.key);
    } else {
        envelopes.insert(body.key, body.data);
    }
    StatusCode::OK
}

async fn get_session(
    State(service): State<StubService>,
    Path(key): Path<String>,
) -> Json<serde_json::Value> {
    match service.envelopes.lock().unwrap().get(&key) {
        Some(data) => Json(serde_json::json!({ "message": data })),
        None => Json(serde_json::json!({})),
    }
}

async fn start_stub() -> (String, StubService) {
    let service = StubService::default();
    let app = Router::new()
        .route("/api/session", post(post_session))
        .route("/api/session/:key", get(get_session))
        .with_state(service.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/api", addr), service)
}

async fn start_failing_stub(status: StatusCode) -> String {
    let app = Router::new()
        .route("/session", post(move || async move { (status, "nope") }))
        .route("/session/:key", get(move || async move { (status, "nope") }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn config_for(base_url: &str) -> SessionConfig {
    SessionConfig {
        server_url: base_url.to_string(),
        request_timeout_secs: 5,
        ..SessionConfig::default()
    }
}

#[tokio::test]
async fn test_lifecycle_over_http() {
    let (base_url, service) = start_stub().await;
    let config = config_for(&base_url);

    let manager = SessionManager::new(
        Arc::new(MemorySecretStore::new()),
        Arc::new(HttpTransport::from_config(&config).unwrap()),
        Arc::new(TcpReachability::new(&config.server_url, config.request_timeout()).unwrap()),
        CryptoProvider::system(),
        &config,
    );

    let session_id = manager.create(b"abc", 99_999_999).await.unwrap();
    assert_eq!(service.requests.lock().unwrap()[0].timeout, 604_800);

    assert_eq!(manager.authorize(&session_id, false).await.unwrap(), b"abc");
    assert!(manager.invalidate(&session_id).await.unwrap());
    assert!(service.envelopes.lock().unwrap().is_empty());

    assert!(matches!(
        manager.authorize(&session_id, false).await,
        Err(SessionError::SessionExpired)
    ));
}

#[tokio::test]
async fn test_missing_message_is_none() {
    let (base_url, _service) = start_stub().await;
    let transport = HttpTransport::new(&base_url, Duration::from_secs(5)).unwrap();

    let response = transport.authorize_session("04ffff").await.unwrap();
    assert_eq!(response.and_then(|r| r.message), None);
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let base_url = start_failing_stub(StatusCode::INTERNAL_SERVER_ERROR).await;
    let transport = HttpTransport::new(&base_url, Duration::from_secs(5)).unwrap();

    let body = SessionRequestBody {
        key: "04aa".to_string(),
        data: "{}".to_string(),
        signature: "30".to_string(),
        timeout: 10,
    };
    match transport.create_session(&body).await {
        Err(TransportError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "nope");
        }
        other => panic!("expected status error, got {:?}", other),
    }

    assert!(matches!(
        transport.authorize_session("04aa").await,
        Err(TransportError::Status { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_create_against_failing_service() {
    let base_url = start_failing_stub(StatusCode::SERVICE_UNAVAILABLE).await;
    let config = config_for(&base_url);
    let store = MemorySecretStore::new();

    let manager = SessionManager::new(
        Arc::new(store.clone()),
        Arc::new(HttpTransport::from_config(&config).unwrap()),
        Arc::new(StaticReachability::online()),
        CryptoProvider::system(),
        &config,
    );

    assert!(matches!(
        manager.create(b"abc", 60).await,
        Err(SessionError::SessionCreate(_))
    ));
    assert_eq!(store.count().await, 0);
}

#[tokio::test]
async fn test_non_json_response_is_user_not_found() {
    let app = Router::new().route(
        "/session/:key",
        get(|| async { (StatusCode::OK, "<html>not json</html>") }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let base_url = format!("http://{}", addr);
    let transport = HttpTransport::new(&base_url, Duration::from_secs(5)).unwrap();
    assert!(matches!(
        transport.authorize_session("04aa").await,
        Err(TransportError::Decode(_))
    ));

    let config = config_for(&base_url);
    let manager = SessionManager::new(
        Arc::new(MemorySecretStore::new()),
        Arc::new(transport),
        Arc::new(StaticReachability::online()),
        CryptoProvider::system(),
        &config,
    );
    assert!(matches!(
        manager.authorize(&"01".repeat(32), false).await,
        Err(SessionError::UserNotFound(CryptoError::InvalidPayload { .. }))
    ));
}

#[tokio::test]
async fn test_client_timeout() {
    let app = Router::new().route(
        "/session/:key",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let transport = HttpTransport::new(&format!("http://{}", addr), Duration::from_millis(200)).unwrap();
    assert!(matches!(
        transport.authorize_session("04aa").await,
        Err(TransportError::Timeout)
    ));
}
