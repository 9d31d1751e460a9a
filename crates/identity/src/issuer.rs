//! Credential issuance and rotation.
//!
//! # Rotation
//!
//! ```text
//! presented credential
//!     ↓ length >= 36            else InvalidCredential
//! lookup by identifier          miss or store error => InvalidCredential
//!     ↓
//! secret check (Argon2id)       mismatch => InvalidCredential
//! consumed?                     => CredentialReplayed
//! now > expires_at?             => CredentialExpired
//!     ↓
//! address == bound_address?     else alert + AddressMismatch (record untouched)
//!     ↓
//! mark consumed (CAS)           lost race => CredentialReplayed, store error => InternalFailure
//!     ↓
//! issue fresh pair bound to the request address
//! ```
//!
//! With `verify_secret_first = false` the consumed and expiry checks run
//! before the secret check instead, which tells an identifier-only caller
//! whether that identifier was consumed or expired.
//!
//! Nothing is consumed before the secret and freshness are both verified, so
//! enumerating identifiers cannot burn a legitimate holder's credential.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tessera_core::{Clock, CoreError, IssuerConfig, SystemClock};
use tessera_crypto::{credential_identifier, AccessTokenSigner, RenewalCredential, SecretHasher};
use tracing::{debug, error, info, warn};

use crate::anomaly::{AnomalyDispatcher, TheftAlert};
use crate::error::{IssuerError, IssuerResult, StoreError};
use crate::model::{CredentialPair, RenewalRecord};
use crate::store::CredentialStore;

/// Observability counters.
#[derive(Debug, Default)]
pub struct IssuerMetrics {
    pairs_issued_total: AtomicU64,
    rotations_total: AtomicU64,
    invalid_credentials_total: AtomicU64,
    expired_credentials_total: AtomicU64,
    replays_detected_total: AtomicU64,
    address_mismatches_total: AtomicU64,
    internal_failures_total: AtomicU64,
}

/// Point-in-time copy of [`IssuerMetrics`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IssuerMetricsSnapshot {
    pub pairs_issued_total: u64,
    pub rotations_total: u64,
    pub invalid_credentials_total: u64,
    pub expired_credentials_total: u64,
    pub replays_detected_total: u64,
    pub address_mismatches_total: u64,
    pub internal_failures_total: u64,
}

impl IssuerMetrics {
    fn record_failure(&self, error: &IssuerError) {
        let counter = match error {
            IssuerError::InvalidCredential => &self.invalid_credentials_total,
            IssuerError::CredentialExpired => &self.expired_credentials_total,
            IssuerError::CredentialReplayed => &self.replays_detected_total,
            IssuerError::AddressMismatch => &self.address_mismatches_total,
            IssuerError::InternalFailure(_) => &self.internal_failures_total,
            IssuerError::InvalidSubject => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IssuerMetricsSnapshot {
        IssuerMetricsSnapshot {
            pairs_issued_total: self.pairs_issued_total.load(Ordering::Relaxed),
            rotations_total: self.rotations_total.load(Ordering::Relaxed),
            invalid_credentials_total: self.invalid_credentials_total.load(Ordering::Relaxed),
            expired_credentials_total: self.expired_credentials_total.load(Ordering::Relaxed),
            replays_detected_total: self.replays_detected_total.load(Ordering::Relaxed),
            address_mismatches_total: self.address_mismatches_total.load(Ordering::Relaxed),
            internal_failures_total: self.internal_failures_total.load(Ordering::Relaxed),
        }
    }
}

/// Mints credential pairs and rotates renewal credentials.
///
/// Holds no per-credential state; every record lives in the store. Safe to
/// share across threads behind an `Arc`.
pub struct CredentialIssuer {
    config: Arc<IssuerConfig>,
    store: Arc<dyn CredentialStore>,
    signer: AccessTokenSigner,
    hasher: SecretHasher,
    clock: Arc<dyn Clock>,
    alerts: AnomalyDispatcher,
    metrics: IssuerMetrics,
}

impl CredentialIssuer {
    /// Builds an issuer from validated configuration.
    pub fn new(
        config: Arc<IssuerConfig>,
        store: Arc<dyn CredentialStore>,
        alerts: AnomalyDispatcher,
    ) -> tessera_core::Result<Self> {
        config.validate()?;

        let signer = AccessTokenSigner::new(config.access_secret.as_bytes(), config.access_ttl())
            .map_err(|e| CoreError::Config(e.to_string()))?;
        let hasher = SecretHasher::new(config.renewal_secret.as_bytes(), &config.hashing)
            .map_err(|e| CoreError::Config(e.to_string()))?;

        info!(
            access_ttl_secs = config.access_ttl_secs,
            renewal_ttl_secs = config.renewal_ttl_secs,
            verify_secret_first = config.verify_secret_first,
            alerts_enabled = alerts.is_enabled(),
            "Credential issuer initialized"
        );

        Ok(Self {
            config,
            store,
            signer,
            hasher,
            clock: Arc::new(SystemClock),
            alerts,
            metrics: IssuerMetrics::default(),
        })
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn signer(&self) -> &AccessTokenSigner {
        &self.signer
    }

    pub fn metrics(&self) -> IssuerMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Mints a new credential pair for `subject_id`, bound to `request_address`.
    ///
    /// The renewal record is stored before the pair is returned; if the
    /// store write fails the caller gets nothing.
    pub fn issue_pair(&self, subject_id: &str, request_address: &str) -> IssuerResult<CredentialPair> {
        let result = self.issue_pair_inner(subject_id, request_address);
        match &result {
            Ok(_) => {
                self.metrics.pairs_issued_total.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => self.metrics.record_failure(e),
        }
        result
    }

    fn issue_pair_inner(&self, subject_id: &str, request_address: &str) -> IssuerResult<CredentialPair> {
        if subject_id.is_empty() {
            return Err(IssuerError::InvalidSubject);
        }

        let now_ms = self.clock.now_ms();

        let access_token = self
            .signer
            .sign(subject_id, request_address, now_ms)
            .map_err(|e| internal("sign access credential", e))?;

        let renewal = RenewalCredential::generate();
        let secret_hash = self
            .hasher
            .hash(renewal.as_str())
            .map_err(|e| internal("hash renewal credential", e))?;

        let expires_at_ms = u64::try_from(self.config.renewal_ttl().as_millis())
            .ok()
            .and_then(|ttl_ms| now_ms.checked_add(ttl_ms))
            .ok_or_else(|| internal("compute renewal expiry", "lifetime overflows u64"))?;

        let record = RenewalRecord {
            id: renewal.identifier().to_string(),
            subject_id: subject_id.to_string(),
            secret_hash,
            bound_address: request_address.to_string(),
            issued_at_ms: now_ms,
            expires_at_ms,
            consumed: false,
        };

        self.store
            .create(&record)
            .map_err(|e| internal("store renewal record", e))?;

        info!(
            subject_id = %subject_id,
            credential_id = %record.id,
            expires_at_ms = record.expires_at_ms,
            "Credential pair issued"
        );

        Ok(CredentialPair {
            access_token,
            refresh_token: renewal.into_string(),
        })
    }

    /// Exchanges a valid, unconsumed renewal credential for a fresh pair.
    pub fn rotate(&self, presented: &str, request_address: &str) -> IssuerResult<CredentialPair> {
        let record = match self.authorize_rotation(presented, request_address) {
            Ok(record) => record,
            Err(e) => {
                self.metrics.record_failure(&e);
                return Err(e);
            }
        };

        // The new pair goes through issue_pair, which keeps its own counters.
        let pair = self.issue_pair(&record.subject_id, request_address)?;
        self.metrics.rotations_total.fetch_add(1, Ordering::Relaxed);

        info!(
            subject_id = %record.subject_id,
            credential_id = %record.id,
            "Renewal credential rotated"
        );
        Ok(pair)
    }

    /// Runs every check and consumes the record; returns it on success.
    fn authorize_rotation(&self, presented: &str, request_address: &str) -> IssuerResult<RenewalRecord> {
        let id = credential_identifier(presented).map_err(|_| IssuerError::InvalidCredential)?;

        let record = match self.store.fetch_by_id(id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(credential_id = %id, "Unknown renewal credential");
                return Err(IssuerError::InvalidCredential);
            }
            Err(e) => {
                warn!(credential_id = %id, error = %e, "Store lookup failed during rotation");
                return Err(IssuerError::InvalidCredential);
            }
        };

        let now_ms = self.clock.now_ms();
        if self.config.verify_secret_first {
            self.verify_secret(presented, &record)?;
            self.check_freshness(&record, now_ms)?;
        } else {
            self.check_freshness(&record, now_ms)?;
            self.verify_secret(presented, &record)?;
        }

        if !record.is_bound_to(request_address) {
            warn!(
                subject_id = %record.subject_id,
                credential_id = %record.id,
                bound_address = %record.bound_address,
                observed_address = %request_address,
                "Renewal credential presented from unbound address"
            );
            self.alerts.dispatch(TheftAlert {
                subject_id: record.subject_id.clone(),
                credential_id: record.id.clone(),
                bound_address: record.bound_address.clone(),
                observed_address: request_address.to_string(),
                detected_at_ms: now_ms,
            });
            return Err(IssuerError::AddressMismatch);
        }

        match self.store.mark_consumed(&record.id) {
            Ok(()) => Ok(record),
            Err(StoreError::AlreadyConsumed { .. }) => {
                warn!(
                    subject_id = %record.subject_id,
                    credential_id = %record.id,
                    "Renewal credential consumed concurrently"
                );
                Err(IssuerError::CredentialReplayed)
            }
            Err(e) => Err(internal("mark renewal record consumed", e)),
        }
    }

    fn verify_secret(&self, presented: &str, record: &RenewalRecord) -> IssuerResult<()> {
        match self.hasher.verify(presented, &record.secret_hash) {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(credential_id = %record.id, "Renewal secret mismatch");
                Err(IssuerError::InvalidCredential)
            }
            Err(e) => Err(internal("verify renewal secret", e)),
        }
    }

    fn check_freshness(&self, record: &RenewalRecord, now_ms: u64) -> IssuerResult<()> {
        if record.consumed {
            warn!(
                subject_id = %record.subject_id,
                credential_id = %record.id,
                "Consumed renewal credential presented again"
            );
            return Err(IssuerError::CredentialReplayed);
        }

        if record.is_expired_at(now_ms) {
            debug!(
                credential_id = %record.id,
                expires_at_ms = record.expires_at_ms,
                now_ms,
                "Renewal credential expired"
            );
            return Err(IssuerError::CredentialExpired);
        }

        Ok(())
    }
}

fn internal(action: &str, e: impl std::fmt::Display) -> IssuerError {
    error!(action, error = %e, "Credential operation failed");
    IssuerError::InternalFailure(format!("failed to {action}: {e}"))
}
