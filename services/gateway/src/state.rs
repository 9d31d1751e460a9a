use std::sync::Arc;

use anyhow::Result;
use tessera_core::{Config, StoreBackend};
use tessera_identity::{
    AnomalyDispatcher, CredentialIssuer, CredentialStore, LogNotifier, MemoryCredentialStore,
    SqliteCredentialStore, StaticContactDirectory,
};
use tokio::task::JoinHandle;
use tracing::info;

pub struct AppState {
    pub issuer: Arc<CredentialIssuer>,
    pub trust_forwarded_for: bool,
    #[allow(dead_code)]
    alert_worker: Option<JoinHandle<()>>,
}

impl AppState {
    /// Wires the store, alert worker and issuer. Must run inside a Tokio runtime.
    pub fn new(config: &Config) -> Result<Self> {
        let store: Arc<dyn CredentialStore> = match config.store.backend {
            StoreBackend::Sqlite => Arc::new(SqliteCredentialStore::open(&config.store.path)?),
            StoreBackend::Memory => {
                info!("Using in-memory credential store; records are lost on restart");
                Arc::new(MemoryCredentialStore::new())
            }
        };

        let (alerts, alert_worker) = if config.notifier.enabled {
            let (dispatcher, worker) = AnomalyDispatcher::spawn(
                Arc::new(LogNotifier),
                Arc::new(StaticContactDirectory::new(
                    config.notifier.fallback_contact.clone(),
                )),
            )?;
            (dispatcher, Some(worker))
        } else {
            (AnomalyDispatcher::disabled(), None)
        };

        let issuer = CredentialIssuer::new(Arc::new(config.issuer.clone()), store, alerts)?;
        Ok(Self::from_issuer(Arc::new(issuer), config.server.trust_forwarded_for)
            .with_alert_worker(alert_worker))
    }

    pub fn from_issuer(issuer: Arc<CredentialIssuer>, trust_forwarded_for: bool) -> Self {
        Self {
            issuer,
            trust_forwarded_for,
            alert_worker: None,
        }
    }

    fn with_alert_worker(mut self, worker: Option<JoinHandle<()>>) -> Self {
        self.alert_worker = worker;
        self
    }
}
