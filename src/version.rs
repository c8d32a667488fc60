// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Fabstir session manager

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-legacy-ciphertext-2025-10-16";

/// Semantic version number
pub const VERSION_NUMBER: &str = "0.1.0";

/// Build date
pub const BUILD_DATE: &str = "2025-10-16";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "secp256k1-session-keys",
    "ecies-aes-cbc-hmac",
    "keccak-ecdsa-signatures",
    "legacy-ciphertext-format",
    "encrypted-file-store",
    "client-request-timeout",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Fabstir Session Manager {} ({})", VERSION_NUMBER, BUILD_DATE)
}
