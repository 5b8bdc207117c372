//! Password authentication helpers
//!
//! # Architecture
//!
//! - Requests carry HTTP Basic credentials; only the password part is checked
//! - The expected password is the first line of a password file
//! - An empty password disables auth checking
//! - Passwords are compared by SHA-256 digest, never as raw strings

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::path::Path;

// ========================================
// Error Types
// ========================================

/// Authentication error types
#[derive(Debug, Clone, PartialEq)]
pub enum ApiAuthError {
    /// No `Authorization` header on the request
    MissingCredentials,

    /// Header present but not `Basic <base64(user:password)>`
    MalformedCredentials(String),

    /// Password does not match
    InvalidPassword,
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::MissingCredentials => write!(f, "Missing credentials"),
            ApiAuthError::MalformedCredentials(reason) => {
                write!(f, "Malformed credentials: {}", reason)
            }
            ApiAuthError::InvalidPassword => write!(f, "Invalid password"),
        }
    }
}

impl std::error::Error for ApiAuthError {}

// ========================================
// Password File
// ========================================

/// Load the server password from the first line of `path`
///
/// Trailing `\r`/`\n` is stripped. An empty file yields an empty password,
/// which disables authentication.
pub fn load_password(path: &Path) -> crate::Result<String> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::Config(format!("Password file {}: {}", path.display(), e))
    })?;
    Ok(content.lines().next().unwrap_or_default().to_string())
}

// ========================================
// Basic Credentials
// ========================================

/// Extract the password from an `Authorization: Basic ...` header value
///
/// # Examples
///
/// ```
/// use river_common::api::auth::parse_basic_authorization;
///
/// // base64("user:secret")
/// let password = parse_basic_authorization("Basic dXNlcjpzZWNyZXQ=").unwrap();
/// assert_eq!(password, "secret");
/// ```
pub fn parse_basic_authorization(header: &str) -> Result<String, ApiAuthError> {
    let (scheme, encoded) = header
        .trim()
        .split_once(' ')
        .ok_or_else(|| ApiAuthError::MalformedCredentials("missing scheme".to_string()))?;

    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(ApiAuthError::MalformedCredentials(format!(
            "unsupported scheme '{}'",
            scheme
        )));
    }

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ApiAuthError::MalformedCredentials(e.to_string()))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|e| ApiAuthError::MalformedCredentials(e.to_string()))?;

    let (_user, password) = decoded
        .split_once(':')
        .ok_or_else(|| ApiAuthError::MalformedCredentials("missing ':'".to_string()))?;

    Ok(password.to_string())
}

/// Check a provided password against the expected one
pub fn verify_password(provided: &str, expected: &str) -> Result<(), ApiAuthError> {
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    if provided == expected {
        Ok(())
    } else {
        Err(ApiAuthError::InvalidPassword)
    }
}
