//! Expiry boundary tests against the durable store.

use crate::test_utils::*;
use std::sync::Arc;
use tessera_core::Clock;
use tessera_identity::{IssuerError, SqliteCredentialStore};

const START_MS: u64 = 1_700_000_000_000;
// Matches renewal_ttl_secs in test_issuer_config
const RENEWAL_TTL_MS: u64 = 600_000;

fn memory_sqlite() -> Arc<SqliteCredentialStore> {
    Arc::new(SqliteCredentialStore::open_in_memory().unwrap())
}

#[test]
fn test_rotation_allowed_at_exact_expiry() {
    let (issuer, clock) = issuer_with_clock(memory_sqlite(), true, START_MS);
    let pair = issuer.issue_pair("user-1", HOME_ADDRESS).unwrap();

    clock.set(START_MS + RENEWAL_TTL_MS);
    assert!(issuer.rotate(&pair.refresh_token, HOME_ADDRESS).is_ok());
}

#[test]
fn test_rotation_rejected_one_ms_after_expiry() {
    let (issuer, clock) = issuer_with_clock(memory_sqlite(), true, START_MS);
    let pair = issuer.issue_pair("user-1", HOME_ADDRESS).unwrap();

    clock.set(START_MS + RENEWAL_TTL_MS + 1);
    assert!(matches!(
        issuer.rotate(&pair.refresh_token, HOME_ADDRESS),
        Err(IssuerError::CredentialExpired)
    ));
    assert_eq!(issuer.metrics().expired_credentials_total, 1);
}

#[test]
fn test_rotated_pair_gets_fresh_lifetime() {
    let (issuer, clock) = issuer_with_clock(memory_sqlite(), true, START_MS);
    let first = issuer.issue_pair("user-1", HOME_ADDRESS).unwrap();

    clock.advance_ms(RENEWAL_TTL_MS - 1);
    let second = issuer.rotate(&first.refresh_token, HOME_ADDRESS).unwrap();

    // Well past the first credential's expiry, still inside the second's
    clock.advance_ms(RENEWAL_TTL_MS - 1);
    assert!(issuer.rotate(&second.refresh_token, HOME_ADDRESS).is_ok());
}

#[test]
fn test_access_token_lifetime_follows_clock() {
    let (issuer, clock) = issuer_with_clock(memory_sqlite(), true, START_MS);
    let pair = issuer.issue_pair("user-1", HOME_ADDRESS).unwrap();

    let claims = issuer.signer().verify(&pair.access_token, clock.now_ms()).unwrap();
    assert_eq!(claims.iat, START_MS / 1000);
    assert_eq!(claims.exp, START_MS / 1000 + 60);

    clock.advance_ms(61_000);
    assert!(issuer.signer().verify(&pair.access_token, clock.now_ms()).is_err());
}

#[test]
fn test_expired_with_wrong_secret_depends_on_check_order() {
    for (verify_secret_first, expect_expired) in [(true, false), (false, true)] {
        let (issuer, clock) = issuer_with_clock(memory_sqlite(), verify_secret_first, START_MS);
        let pair = issuer.issue_pair("user-1", HOME_ADDRESS).unwrap();
        let forged = format!("{}.AAAAAAAAAAAAAAAAAAAAAA", identifier_of(&pair.refresh_token));

        clock.advance_ms(RENEWAL_TTL_MS + 1);
        let result = issuer.rotate(&forged, HOME_ADDRESS);

        if expect_expired {
            assert!(matches!(result, Err(IssuerError::CredentialExpired)));
        } else {
            assert!(matches!(result, Err(IssuerError::InvalidCredential)));
        }
    }
}
