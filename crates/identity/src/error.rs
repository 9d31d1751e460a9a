//! Error types for Tessera credential operations.
//!
//! [`IssuerError`] is the caller-facing taxonomy returned by the issuer.
//! [`StoreError`] and [`NotifyError`] belong to the external collaborators and
//! are translated by the issuer before they reach a caller.

use serde::Serialize;
use thiserror::Error;

/// Failure kinds returned by [`crate::CredentialIssuer`].
///
/// "Unknown" and "wrong secret" are both reported as `InvalidCredential` so a
/// caller cannot probe which identifiers exist.
#[derive(Debug, Error)]
pub enum IssuerError {
    /// Malformed, unknown, or hash-mismatched renewal credential
    #[error("Invalid renewal credential")]
    InvalidCredential,

    /// Renewal credential is past its expiry
    #[error("Renewal credential expired")]
    CredentialExpired,

    /// Renewal credential was already consumed
    #[error("Renewal credential already used")]
    CredentialReplayed,

    /// Renewal credential presented from an address other than the bound one
    #[error("Request address does not match credential binding")]
    AddressMismatch,

    /// Issuance requested for an empty subject identifier
    #[error("Subject identifier must not be empty")]
    InvalidSubject,

    /// Storage, signing, or hashing failure not attributable to the caller
    #[error("Internal failure: {0}")]
    InternalFailure(String),
}

/// Fieldless mirror of [`IssuerError`] for transport adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidCredential,
    CredentialExpired,
    CredentialReplayed,
    AddressMismatch,
    InvalidSubject,
    InternalFailure,
}

impl IssuerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IssuerError::InvalidCredential => ErrorKind::InvalidCredential,
            IssuerError::CredentialExpired => ErrorKind::CredentialExpired,
            IssuerError::CredentialReplayed => ErrorKind::CredentialReplayed,
            IssuerError::AddressMismatch => ErrorKind::AddressMismatch,
            IssuerError::InvalidSubject => ErrorKind::InvalidSubject,
            IssuerError::InternalFailure(_) => ErrorKind::InternalFailure,
        }
    }
}

/// Errors raised by a [`crate::store::CredentialStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Renewal record already exists: {id}")]
    Duplicate { id: String },

    #[error("Renewal record not found: {id}")]
    NotFound { id: String },

    /// Compare-and-set on the consumed flag lost
    #[error("Renewal record already consumed: {id}")]
    AlreadyConsumed { id: String },

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Errors raised by an [`crate::anomaly::AnomalyNotifier`]. Always swallowed.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("No async runtime available for the alert worker")]
    NoRuntime,
}

/// Result type for issuer operations.
pub type IssuerResult<T> = Result<T, IssuerError>;
