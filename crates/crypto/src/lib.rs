//! Cryptographic primitives for the Tessera credential service.
//!
//! This crate provides the two halves of a credential pair and the one-way
//! hashing used to store renewal credentials at rest.
//!
//! # Core Capabilities
//!
//! - **Access Credentials**: HMAC-SHA512 signed JWTs carrying subject, address and expiry
//! - **Renewal Credentials**: 256-bit random secrets with an embedded lookup identifier
//! - **Secret Hashing**: Argon2id with per-credential salt and a server-side pepper
//!
//! # Security Principles
//!
//! - Secrets must never be logged or hardcoded
//! - Renewal credentials are only ever stored as slow salted hashes
//! - Hash comparison is constant time
//! - Raw random material is zeroized after use

pub mod renewal;
pub mod signing;

pub use renewal::{
    credential_identifier, RenewalCredential, RenewalError, SecretHasher, IDENTIFIER_LEN,
    RANDOM_BYTES,
};
pub use signing::{AccessClaims, AccessTokenError, AccessTokenSigner, ACCESS_ALGORITHM};
