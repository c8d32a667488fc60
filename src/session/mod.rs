// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Encrypted session lifecycle and its collaborators

pub mod encrypted_store;
pub mod error;
pub mod manager;
pub mod reachability;
pub mod store;
pub mod transport;
pub mod types;

pub use encrypted_store::{EncryptedFileStore, DEFAULT_PBKDF2_ITERATIONS};
pub use error::{SessionError, StoreError, TransportError};
pub use manager::SessionManager;
pub use reachability::{Reachability, StaticReachability, TcpReachability};
pub use store::{
    MemorySecretStore, SecretStore, EPHEM_PUBLIC_KEY_KEY, IV_KEY, MAC_KEY, SESSION_ID_KEY,
};
pub use transport::{HttpTransport, SessionTransport};
pub use types::{
    clamp_session_timeout, AuthorizeResponse, SessionRequestBody, SessionState, ShareMetadata,
    INVALIDATE_TIMEOUT_SECS, MAX_SESSION_TIMEOUT_SECS,
};
