// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod cli;
pub mod config;
pub mod crypto;
pub mod session;
pub mod version;

// Re-export main types
pub use config::{ConfigError, SessionConfig};
pub use crypto::{CryptoEngine, CryptoError, CryptoProvider, SessionKeyPair, ShareMetadata};
pub use session::{
    EncryptedFileStore, HttpTransport, MemorySecretStore, Reachability, SecretStore, SessionError,
    SessionManager, SessionState, SessionTransport, StaticReachability, TcpReachability,
};
