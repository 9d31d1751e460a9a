//! Durable storage for renewal records.
//!
//! The issuer only needs three operations. `mark_consumed` must be an atomic
//! compare-and-set: it succeeds for exactly one caller per record and returns
//! [`StoreError::AlreadyConsumed`] to everyone else.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryCredentialStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCredentialStore;

use std::sync::Arc;

use crate::error::StoreError;
use crate::model::RenewalRecord;

pub trait CredentialStore: Send + Sync {
    /// Persists a new record. Fails with [`StoreError::Duplicate`] if the id exists.
    fn create(&self, record: &RenewalRecord) -> Result<(), StoreError>;

    /// Fetches a record by identifier; `Ok(None)` when absent.
    fn fetch_by_id(&self, id: &str) -> Result<Option<RenewalRecord>, StoreError>;

    /// Flips `consumed` from `false` to `true`, atomically.
    fn mark_consumed(&self, id: &str) -> Result<(), StoreError>;
}

impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    fn create(&self, record: &RenewalRecord) -> Result<(), StoreError> {
        (**self).create(record)
    }

    fn fetch_by_id(&self, id: &str) -> Result<Option<RenewalRecord>, StoreError> {
        (**self).fetch_by_id(id)
    }

    fn mark_consumed(&self, id: &str) -> Result<(), StoreError> {
        (**self).mark_consumed(id)
    }
}
