//! In-process store for tests and single-node deployments.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use super::CredentialStore;
use crate::error::StoreError;
use crate::model::RenewalRecord;

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: RwLock<HashMap<String, RenewalRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("record lock poisoned".to_string())
}

impl CredentialStore for MemoryCredentialStore {
    fn create(&self, record: &RenewalRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        if records.contains_key(&record.id) {
            return Err(StoreError::Duplicate {
                id: record.id.clone(),
            });
        }
        records.insert(record.id.clone(), record.clone());
        debug!(credential_id = %record.id, "Renewal record created");
        Ok(())
    }

    fn fetch_by_id(&self, id: &str) -> Result<Option<RenewalRecord>, StoreError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.get(id).cloned())
    }

    fn mark_consumed(&self, id: &str) -> Result<(), StoreError> {
        // Check and flip under one write lock.
        let mut records = self.records.write().map_err(|_| poisoned())?;
        match records.get_mut(id) {
            None => Err(StoreError::NotFound { id: id.to_string() }),
            Some(record) if record.consumed => Err(StoreError::AlreadyConsumed { id: id.to_string() }),
            Some(record) => {
                record.consumed = true;
                Ok(())
            }
        }
    }
}
