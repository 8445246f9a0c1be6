//! Custom error types for the common library
//!
//! This module defines the error types raised by the flat-file stores that
//! back the Aura application.

use thiserror::Error;

/// Custom error type for flat-file storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Error occurred while reading or writing a backing file
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error occurred while encoding a record set
    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;

/// Custom error type for the credential registry
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The username is already registered
    #[error("Username already exists")]
    AlreadyExists,

    /// The credential scheme failed to hash or parse a secret
    #[error("Credential hashing error: {0}")]
    Hashing(String),

    /// The backing registry file could not be written
    #[error("Registry storage error: {0}")]
    Store(#[from] StoreError),
}

/// Type alias for Result with RegistryError
pub type RegistryResult<T> = Result<T, RegistryError>;
