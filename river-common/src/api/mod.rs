//! Shared HTTP API functionality
//!
//! Contains ONLY pure functions and shared types, no HTTP framework
//! dependencies. The server wraps these with its own middleware.

pub mod auth;

pub use auth::{load_password, parse_basic_authorization, verify_password, ApiAuthError};
