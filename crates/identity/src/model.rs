//! Credential data model.

use serde::{Deserialize, Serialize};

/// Access and renewal credential returned to a caller. Never persisted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Short-lived signed access credential
    pub access_token: String,
    /// Single-use renewal credential
    pub refresh_token: String,
}

impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Durable record of one issued renewal credential.
///
/// Created once per issuance or rotation, read on the next rotation attempt,
/// and mutated at most once when `consumed` flips to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalRecord {
    /// First 36 characters of the renewal credential
    pub id: String,
    pub subject_id: String,
    /// Argon2id PHC string of the full renewal credential
    pub secret_hash: String,
    /// Network address observed at issuance
    pub bound_address: String,
    /// Unix milliseconds
    pub issued_at_ms: u64,
    /// Unix milliseconds; always after `issued_at_ms`
    pub expires_at_ms: u64,
    pub consumed: bool,
}

impl RenewalRecord {
    /// A record expiring exactly at `now_ms` is still usable.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at_ms
    }

    pub fn is_bound_to(&self, address: &str) -> bool {
        self.bound_address == address
    }
}
