//! # River Common Library
//!
//! Shared code for the River server crates:
//! - Error type
//! - Configuration loading (TOML file + platform defaults)
//! - External tool resolution (probe and transcode executables)
//! - Password authentication helpers

pub mod api;
pub mod config;
pub mod error;
pub mod tools;

pub use error::{Error, Result};
