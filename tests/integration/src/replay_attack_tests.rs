//! Replay detection tests
//!
//! A renewal credential must be honored at most once, no matter how many
//! callers present it at the same time or how many issuers share the store.

use crate::test_utils::*;
use std::sync::Arc;
use tessera_identity::{CredentialStore, IssuerError, MemoryCredentialStore, SqliteCredentialStore};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_presentation_yields_single_pair() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let issuer = issuer_over(open_store(&dir.path().join("replay.db")));
    let pair = issuer.issue_pair("user-1", HOME_ADDRESS).unwrap();

    let tasks: Vec<_> = (0..12)
        .map(|_| {
            let issuer = Arc::clone(&issuer);
            let token = pair.refresh_token.clone();
            tokio::task::spawn_blocking(move || issuer.rotate(&token, HOME_ADDRESS))
        })
        .collect();

    let mut successes = 0;
    let mut replays = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => successes += 1,
            Err(IssuerError::CredentialReplayed) => replays += 1,
            Err(e) => panic!("unexpected rotation failure: {:?}", e),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(replays, 11);
    assert_eq!(issuer.metrics().replays_detected_total, 11);
}

#[test]
fn test_issuers_sharing_a_database_agree_on_consumption() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");

    // Two independent connections stand in for two server processes.
    let node_a = issuer_over(open_store(&path));
    let node_b = issuer_over(open_store(&path));

    let pair = node_a.issue_pair("user-1", HOME_ADDRESS).unwrap();
    let next = node_b.rotate(&pair.refresh_token, HOME_ADDRESS).unwrap();

    assert!(matches!(
        node_a.rotate(&pair.refresh_token, HOME_ADDRESS),
        Err(IssuerError::CredentialReplayed)
    ));
    assert!(node_a.rotate(&next.refresh_token, HOME_ADDRESS).is_ok());
}

#[test]
fn test_consumption_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("restart.db");

    let pair = {
        let issuer = issuer_over(open_store(&path));
        let pair = issuer.issue_pair("user-1", HOME_ADDRESS).unwrap();
        issuer.rotate(&pair.refresh_token, HOME_ADDRESS).unwrap();
        pair
    };

    let issuer = issuer_over(open_store(&path));
    assert!(matches!(
        issuer.rotate(&pair.refresh_token, HOME_ADDRESS),
        Err(IssuerError::CredentialReplayed)
    ));
}

#[test]
fn test_predecessor_stays_consumed_along_chain() {
    let store = Arc::new(MemoryCredentialStore::new());
    let issuer = issuer_over(store.clone());

    let mut tokens = vec![issuer.issue_pair("user-1", HOME_ADDRESS).unwrap().refresh_token];
    for _ in 0..5 {
        let last = tokens.last().unwrap().clone();
        tokens.push(issuer.rotate(&last, HOME_ADDRESS).unwrap().refresh_token);
    }

    for token in &tokens[..tokens.len() - 1] {
        let record = store.fetch_by_id(identifier_of(token)).unwrap().unwrap();
        assert!(record.consumed);
        assert!(matches!(
            issuer.rotate(token, HOME_ADDRESS),
            Err(IssuerError::CredentialReplayed)
        ));
    }

    let newest = store
        .fetch_by_id(identifier_of(tokens.last().unwrap()))
        .unwrap()
        .unwrap();
    assert!(!newest.consumed);
    assert_eq!(store.len(), tokens.len());
}

#[test]
fn test_damaged_hash_in_database_fails_closed() {
    let store = Arc::new(SqliteCredentialStore::open_in_memory().unwrap());
    let issuer = issuer_over(store.clone());
    let pair = issuer.issue_pair("user-1", HOME_ADDRESS).unwrap();
    let id = identifier_of(&pair.refresh_token).to_string();

    let changed = store
        .__test_execute_raw_sql(
            &format!(
                "UPDATE renewal_credentials SET secret_hash = 'not-a-phc-string' WHERE id = '{}'",
                id
            ),
            &[],
        )
        .unwrap();
    assert_eq!(changed, 1);

    assert!(matches!(
        issuer.rotate(&pair.refresh_token, HOME_ADDRESS),
        Err(IssuerError::InternalFailure(_))
    ));
    assert!(!store.fetch_by_id(&id).unwrap().unwrap().consumed);
    assert_eq!(issuer.metrics().internal_failures_total, 1);
}
