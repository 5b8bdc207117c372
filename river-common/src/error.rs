//! Common error types for River

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for River operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across River crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Neither the primary nor the fallback executable is on the search path
    #[error("could not find '{primary}' or '{fallback}' executable")]
    ToolNotFound { primary: String, fallback: String },

    /// Explicitly configured executable does not exist or is not executable
    #[error("Tool not usable: {0}")]
    ToolNotUsable(PathBuf),
}
