//! Stolen renewal credential scenarios
//!
//! An attacker who copies a renewal credential and presents it from another
//! address must be refused, must raise an alert, and must not be able to
//! deny the legitimate holder their next rotation.

use crate::test_utils::*;
use std::sync::Arc;
use tessera_core::Clock;
use tessera_identity::{
    AnomalyDispatcher, CredentialIssuer, CredentialStore, IssuerError, MemoryCredentialStore,
    StaticContactDirectory,
};

const CONTACT: &str = "soc@example.com";

fn alerting_issuer(
    store: Arc<MemoryCredentialStore>,
) -> (CredentialIssuer, Arc<RecordingNotifier>, tokio::task::JoinHandle<()>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let (dispatcher, worker) = AnomalyDispatcher::spawn(
        notifier.clone(),
        Arc::new(StaticContactDirectory::new(CONTACT)),
    )
    .unwrap();
    let issuer = CredentialIssuer::new(test_issuer_config(true), store, dispatcher).unwrap();
    (issuer, notifier, worker)
}

#[tokio::test]
async fn test_stolen_credential_from_other_address() {
    init_test_logging();
    let store = Arc::new(MemoryCredentialStore::new());
    let (issuer, notifier, _worker) = alerting_issuer(store.clone());
    let pair = issuer.issue_pair("victim", HOME_ADDRESS).unwrap();

    // Attacker tries twice from their own address
    for _ in 0..2 {
        assert!(matches!(
            issuer.rotate(&pair.refresh_token, ATTACKER_ADDRESS),
            Err(IssuerError::AddressMismatch)
        ));
    }

    notifier.wait_for(2).await;
    assert_eq!(
        notifier.sent(),
        vec![
            (CONTACT.to_string(), ATTACKER_ADDRESS.to_string()),
            (CONTACT.to_string(), ATTACKER_ADDRESS.to_string()),
        ]
    );
    assert_eq!(issuer.metrics().address_mismatches_total, 2);

    // Holder is unaffected
    let record = store
        .fetch_by_id(identifier_of(&pair.refresh_token))
        .unwrap()
        .unwrap();
    assert!(!record.consumed);
    assert!(issuer.rotate(&pair.refresh_token, HOME_ADDRESS).is_ok());
}

#[tokio::test]
async fn test_attacker_after_legitimate_rotation_sees_replay() {
    let store = Arc::new(MemoryCredentialStore::new());
    let (issuer, notifier, _worker) = alerting_issuer(store);
    let pair = issuer.issue_pair("victim", HOME_ADDRESS).unwrap();

    issuer.rotate(&pair.refresh_token, HOME_ADDRESS).unwrap();

    // Consumed is checked before the address, so no alert is raised here
    assert!(matches!(
        issuer.rotate(&pair.refresh_token, ATTACKER_ADDRESS),
        Err(IssuerError::CredentialReplayed)
    ));
    assert!(notifier.sent().is_empty());
}

#[test]
fn test_identifier_enumeration_does_not_burn_credential() {
    let store = Arc::new(MemoryCredentialStore::new());
    let issuer = issuer_over(store.clone());
    let pair = issuer.issue_pair("victim", HOME_ADDRESS).unwrap();
    let id = identifier_of(&pair.refresh_token).to_string();

    for guess in ["AAAAAAAAAAAAAAAAAAAAAA", "BBBBBBBBBBBBBBBBBBBBBB", ""] {
        let forged = format!("{}.{}", id, guess);
        assert!(matches!(
            issuer.rotate(&forged, HOME_ADDRESS),
            Err(IssuerError::InvalidCredential)
        ));
    }

    assert!(!store.fetch_by_id(&id).unwrap().unwrap().consumed);
    assert!(issuer.rotate(&pair.refresh_token, HOME_ADDRESS).is_ok());
}

#[test]
fn test_rotation_rebinds_to_request_address() {
    let issuer = issuer_over(Arc::new(MemoryCredentialStore::new()));
    let pair = issuer.issue_pair("user-1", HOME_ADDRESS).unwrap();
    let next = issuer.rotate(&pair.refresh_token, HOME_ADDRESS).unwrap();

    let claims = issuer
        .signer()
        .verify(&next.access_token, tessera_core::SystemClock.now_ms())
        .unwrap();
    assert_eq!(claims.user_id, "user-1");
    assert_eq!(claims.ip, HOME_ADDRESS);
}
