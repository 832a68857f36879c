//! Core types shared across metricmat
//!
//! Holds the error taxonomy ([`MaterializeError`]) and the user-facing error
//! reporting ([`ErrorContext`], [`user_friendly_error`]). Library modules return
//! [`MaterializeError`] directly; application layers (config, manifest IO, CLI)
//! use `anyhow` and convert at the boundary.

pub mod error;

pub use error::{ErrorContext, MaterializeError, user_friendly_error};

/// Result alias for library operations.
pub type Result<T, E = MaterializeError> = std::result::Result<T, E>;
