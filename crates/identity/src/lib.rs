//! Credential issuance and rotation for Tessera.
//!
//! This crate mints paired access and renewal credentials and rotates
//! renewal credentials, binding each one to the network address that obtained
//! it and refusing any renewal credential that was already used.
//!
//! # Core Concepts
//!
//! - **Credential Pair**: a short-lived signed access credential plus a single-use renewal credential
//! - **Renewal Record**: the stored hash, binding and lifecycle of one renewal credential
//! - **Rotation**: exchanging an unconsumed renewal credential for a fresh pair
//! - **Address Binding**: a renewal credential presented from a different address raises an alert
//!
//! # Security Model
//!
//! - Renewal credentials are stored only as peppered Argon2id hashes
//! - Consumption is an atomic compare-and-set in the store
//! - Nothing is consumed before the secret and expiry have been verified
//! - Alerting is fire-and-forget and cannot fail a rotation
//!
//! # Collaborators
//!
//! Storage ([`store::CredentialStore`]) and alert delivery
//! ([`anomaly::AnomalyNotifier`]) are traits; the transport that exposes the
//! issuer lives outside this crate.

pub mod anomaly;
pub mod error;
pub mod issuer;
pub mod model;
pub mod store;

pub use anomaly::{
    AnomalyDispatcher, AnomalyNotifier, ContactDirectory, LogNotifier, StaticContactDirectory,
    TheftAlert,
};
pub use error::{ErrorKind, IssuerError, IssuerResult, NotifyError, StoreError};
pub use issuer::{CredentialIssuer, IssuerMetrics, IssuerMetricsSnapshot};
pub use model::{CredentialPair, RenewalRecord};
pub use store::{CredentialStore, MemoryCredentialStore};
#[cfg(feature = "sqlite")]
pub use store::SqliteCredentialStore;
