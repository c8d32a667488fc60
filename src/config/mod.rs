// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the session client
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, then `SESSION_*` environment variables.

pub mod session;

pub use session::{ConfigError, SessionConfig};
