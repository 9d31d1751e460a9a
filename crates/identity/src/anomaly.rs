//! Suspected-theft alerting.
//!
//! The issuer hands a [`TheftAlert`] to the [`AnomalyDispatcher`] and moves
//! on. A worker task owns the queue, resolves the subject's contact channel
//! and calls the [`AnomalyNotifier`]. Delivery failures are logged and
//! dropped; they never reach the rotation that raised the alert.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::NotifyError;

/// A renewal credential presented from an address it was not bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TheftAlert {
    pub subject_id: String,
    pub credential_id: String,
    pub bound_address: String,
    pub observed_address: String,
    pub detected_at_ms: u64,
}

/// Delivers an alert to a contact channel (email, push, ...).
#[async_trait]
pub trait AnomalyNotifier: Send + Sync {
    async fn notify(&self, contact: &str, observed_address: &str) -> Result<(), NotifyError>;
}

/// Resolves where a subject's alerts should go.
pub trait ContactDirectory: Send + Sync {
    fn contact_for(&self, subject_id: &str) -> Option<String>;
}

/// Routes every subject to one configured contact.
#[derive(Debug, Clone)]
pub struct StaticContactDirectory {
    contact: String,
}

impl StaticContactDirectory {
    pub fn new(contact: impl Into<String>) -> Self {
        Self {
            contact: contact.into(),
        }
    }
}

impl ContactDirectory for StaticContactDirectory {
    fn contact_for(&self, _subject_id: &str) -> Option<String> {
        Some(self.contact.clone())
    }
}

/// Notifier that only writes the alert to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl AnomalyNotifier for LogNotifier {
    async fn notify(&self, contact: &str, observed_address: &str) -> Result<(), NotifyError> {
        warn!(
            contact = %contact,
            observed_address = %observed_address,
            "Renewal credential presented from unexpected address"
        );
        Ok(())
    }
}

/// Fire-and-forget handle onto the alert queue.
#[derive(Debug, Clone)]
pub struct AnomalyDispatcher {
    tx: Option<mpsc::UnboundedSender<TheftAlert>>,
}

impl AnomalyDispatcher {
    /// Starts the alert worker on the current Tokio runtime.
    ///
    /// The worker exits once every dispatcher clone has been dropped.
    pub fn spawn(
        notifier: Arc<dyn AnomalyNotifier>,
        directory: Arc<dyn ContactDirectory>,
    ) -> Result<(Self, JoinHandle<()>), NotifyError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| NotifyError::NoRuntime)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = handle.spawn(run_worker(rx, notifier, directory));

        info!("Anomaly alert worker started");
        Ok((Self { tx: Some(tx) }, worker))
    }

    /// A dispatcher that drops every alert.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queues an alert without waiting for delivery.
    pub fn dispatch(&self, alert: TheftAlert) {
        let Some(tx) = &self.tx else {
            debug!(credential_id = %alert.credential_id, "Alerting disabled, dropping theft alert");
            return;
        };

        if let Err(e) = tx.send(alert) {
            warn!(
                credential_id = %e.0.credential_id,
                "Alert worker is gone, theft alert dropped"
            );
        }
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<TheftAlert>,
    notifier: Arc<dyn AnomalyNotifier>,
    directory: Arc<dyn ContactDirectory>,
) {
    while let Some(alert) = rx.recv().await {
        let Some(contact) = directory.contact_for(&alert.subject_id) else {
            warn!(
                subject_id = %alert.subject_id,
                "No contact channel for subject, theft alert dropped"
            );
            continue;
        };

        match notifier.notify(&contact, &alert.observed_address).await {
            Ok(()) => debug!(
                subject_id = %alert.subject_id,
                credential_id = %alert.credential_id,
                "Theft alert delivered"
            ),
            Err(e) => warn!(
                subject_id = %alert.subject_id,
                credential_id = %alert.credential_id,
                error = %e,
                "Theft alert delivery failed"
            ),
        }
    }

    debug!("Anomaly alert worker stopped");
}
