//! Cross-crate integration tests for the credential issuer
//!
//! This test suite validates:
//! - Replay detection under concurrent presentation
//! - Several issuers sharing one durable store
//! - Expiry boundaries driven by a manual clock
//! - Stolen-credential scenarios and theft alerting

pub mod test_utils;

#[cfg(test)]
mod replay_attack_tests;

#[cfg(test)]
mod expiry_tests;

#[cfg(test)]
mod credential_theft_tests;
