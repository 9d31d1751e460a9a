//! Access Credential Signing
//!
//! This module mints and verifies short-lived access credentials:
//! - Claims carry the subject, the bound network address and an expiry
//! - Credentials are JWTs signed with HMAC-SHA512 under a dedicated secret
//! - Verification checks the signature first, then expiry against a caller-supplied time
//!
//! # Security Model
//!
//! - The signing secret never leaves this service and is never logged
//! - Forging a credential requires the secret (HMAC-class keyed signature)
//! - Expiry is evaluated against the issuer's clock, not the verifier's wall time

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Signature scheme for every access credential.
pub const ACCESS_ALGORITHM: Algorithm = Algorithm::HS512;

/// Claims encoded inside an access credential. Signed, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject the credential was issued to
    pub user_id: String,
    /// Network address observed at issuance
    pub ip: String,
    /// Issued-at, Unix seconds
    pub iat: u64,
    /// Expiry, Unix seconds
    pub exp: u64,
}

/// Errors that can occur while signing or verifying access credentials.
#[derive(Debug, Error)]
pub enum AccessTokenError {
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Signing failed: {reason}")]
    Signing { reason: String },

    #[error("Access credential rejected: {reason}")]
    Invalid { reason: String },

    #[error("Access credential expired at {exp}")]
    Expired { exp: u64 },
}

/// Signs and verifies access credentials.
pub struct AccessTokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl AccessTokenSigner {
    /// Creates a signer from the shared access secret.
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, AccessTokenError> {
        if secret.is_empty() {
            return Err(AccessTokenError::InvalidField {
                field: "secret".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Signs a credential for `user_id` bound to `ip`, expiring `ttl` after `now_ms`.
    ///
    /// # Examples
    /// ```
    /// use std::time::Duration;
    /// use tessera_crypto::signing::AccessTokenSigner;
    ///
    /// let signer = AccessTokenSigner::new(b"access-secret", Duration::from_secs(900)).unwrap();
    /// let token = signer.sign("user-1", "1.2.3.4", 1_700_000_000_000).unwrap();
    /// let claims = signer.verify(&token, 1_700_000_000_000).unwrap();
    /// assert_eq!(claims.user_id, "user-1");
    /// assert_eq!(claims.exp, 1_700_000_900);
    /// ```
    pub fn sign(&self, user_id: &str, ip: &str, now_ms: u64) -> Result<String, AccessTokenError> {
        let iat = now_ms / 1000;
        let claims = AccessClaims {
            user_id: user_id.to_string(),
            ip: ip.to_string(),
            iat,
            exp: iat.saturating_add(self.ttl.as_secs()),
        };

        encode(&Header::new(ACCESS_ALGORITHM), &claims, &self.encoding_key).map_err(|e| {
            AccessTokenError::Signing {
                reason: e.to_string(),
            }
        })
    }

    /// Verifies the signature and checks expiry against `now_ms`.
    ///
    /// A credential is valid up to and including its `exp` second.
    pub fn verify(&self, token: &str, now_ms: u64) -> Result<AccessClaims, AccessTokenError> {
        let mut validation = Validation::new(ACCESS_ALGORITHM);
        // Expiry is checked below against the supplied time.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<AccessClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            AccessTokenError::Invalid {
                reason: e.to_string(),
            }
        })?;

        let claims = data.claims;
        if now_ms / 1000 > claims.exp {
            return Err(AccessTokenError::Expired { exp: claims.exp });
        }

        Ok(claims)
    }
}
