//! Test utilities for issuer integration tests

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tessera_core::{HashingConfig, IssuerConfig, ManualClock};
use tessera_identity::{
    AnomalyDispatcher, AnomalyNotifier, CredentialIssuer, CredentialStore, NotifyError,
    SqliteCredentialStore,
};
use tokio::sync::Notify;

/// Bound address used by the legitimate holder in most scenarios.
pub const HOME_ADDRESS: &str = "198.51.100.10";

/// Address an attacker presents from.
pub const ATTACKER_ADDRESS: &str = "203.0.113.66";

/// Issuer configuration with cheap hashing parameters.
pub fn test_issuer_config(verify_secret_first: bool) -> Arc<IssuerConfig> {
    Arc::new(IssuerConfig {
        access_secret: "integration-access-secret".to_string(),
        renewal_secret: "integration-renewal-secret".to_string(),
        access_ttl_secs: 60,
        renewal_ttl_secs: 600,
        verify_secret_first,
        hashing: HashingConfig::for_tests(),
    })
}

/// Opens (or reopens) a SQLite store at `path`.
pub fn open_store(path: &Path) -> Arc<SqliteCredentialStore> {
    Arc::new(SqliteCredentialStore::open(path).unwrap())
}

/// Issuer over `store` with alerting disabled.
pub fn issuer_over(store: Arc<dyn CredentialStore>) -> Arc<CredentialIssuer> {
    Arc::new(
        CredentialIssuer::new(
            test_issuer_config(true),
            store,
            AnomalyDispatcher::disabled(),
        )
        .unwrap(),
    )
}

/// Issuer over `store` whose time is driven by the returned clock.
pub fn issuer_with_clock(
    store: Arc<dyn CredentialStore>,
    verify_secret_first: bool,
    start_ms: u64,
) -> (CredentialIssuer, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_ms));
    let issuer = CredentialIssuer::new(
        test_issuer_config(verify_secret_first),
        store,
        AnomalyDispatcher::disabled(),
    )
    .unwrap()
    .with_clock(clock.clone());
    (issuer, clock)
}

/// Identifier part of a renewal credential.
pub fn identifier_of(refresh_token: &str) -> &str {
    tessera_crypto::credential_identifier(refresh_token).unwrap()
}

/// Records every alert delivery and wakes waiters.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
    pub delivered: Notify,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Waits until at least `count` alerts were delivered.
    pub async fn wait_for(&self, count: usize) {
        loop {
            let notified = self.delivered.notified();
            if self.sent.lock().unwrap().len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl AnomalyNotifier for RecordingNotifier {
    async fn notify(&self, contact: &str, observed_address: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((contact.to_string(), observed_address.to_string()));
        self.delivered.notify_waiters();
        Ok(())
    }
}

/// Enables test logging once; repeated calls are harmless.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
