//! Renewal credential minting and salted hashing.
//!
//! A renewal credential is 32 bytes of OS randomness rendered as
//!
//! ```text
//! xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx.yyyyyyyyyyyyyyyyyyyyyy
//! ```
//!
//! The first 16 bytes form a hyphenated hex identifier (36 characters), used
//! as the storage lookup key. The remaining 16 bytes follow a `.` as URL-safe
//! unpadded base64. The full string is the secret; only its Argon2id hash is
//! ever stored.
//!
//! The identifier is a prefix of the secret, so a stored identifier discloses
//! part of the credential. The format is kept as-is for wire compatibility.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use tessera_core::HashingConfig;
use thiserror::Error;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Length of the lookup identifier prefix.
pub const IDENTIFIER_LEN: usize = 36;

/// Bytes of randomness in a renewal credential.
pub const RANDOM_BYTES: usize = 32;

/// Separator between identifier and trailing entropy.
pub const SEPARATOR: char = '.';

/// Renewal credential error types.
#[derive(Debug, Error)]
pub enum RenewalError {
    #[error("Malformed renewal credential")]
    Malformed,

    #[error("Invalid hashing parameters: {0}")]
    Params(String),

    #[error("Hashing failed: {0}")]
    Hashing(String),

    #[error("Stored hash is not a valid PHC string: {0}")]
    MalformedHash(String),
}

/// A freshly minted renewal credential. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct RenewalCredential {
    token: String,
}

impl RenewalCredential {
    /// Mints a credential from the operating system RNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut OsRng)
    }

    /// Mints a credential from the supplied cryptographic RNG.
    pub fn generate_with<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = Zeroizing::new([0u8; RANDOM_BYTES]);
        rng.fill_bytes(&mut bytes[..]);

        let mut id_bytes = [0u8; 16];
        id_bytes.copy_from_slice(&bytes[..16]);
        let identifier = Uuid::from_bytes(id_bytes).hyphenated().to_string();
        id_bytes.zeroize();

        let token = format!(
            "{}{}{}",
            identifier,
            SEPARATOR,
            URL_SAFE_NO_PAD.encode(&bytes[16..])
        );

        Self { token }
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// The lookup identifier, i.e. the first [`IDENTIFIER_LEN`] characters.
    pub fn identifier(&self) -> &str {
        &self.token[..IDENTIFIER_LEN]
    }

    pub fn into_string(mut self) -> String {
        std::mem::take(&mut self.token)
    }
}

// The secret stays out of Debug output.
impl std::fmt::Debug for RenewalCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenewalCredential")
            .field("identifier", &self.identifier())
            .finish_non_exhaustive()
    }
}

/// Extracts the lookup identifier from a presented credential.
///
/// Only length is checked; anything at least [`IDENTIFIER_LEN`] bytes long
/// yields its prefix, and an unknown prefix simply misses in the store.
pub fn credential_identifier(presented: &str) -> Result<&str, RenewalError> {
    presented.get(..IDENTIFIER_LEN).ok_or(RenewalError::Malformed)
}

/// Salted, peppered Argon2id hashing of renewal credentials.
pub struct SecretHasher {
    pepper: Zeroizing<Vec<u8>>,
    params: Params,
}

impl SecretHasher {
    /// Creates a hasher keyed with `pepper` and the configured cost.
    pub fn new(pepper: &[u8], config: &HashingConfig) -> Result<Self, RenewalError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| RenewalError::Params(e.to_string()))?;

        let hasher = Self {
            pepper: Zeroizing::new(pepper.to_vec()),
            params,
        };
        // Surface a bad pepper length at construction, not on first use.
        hasher.argon2()?;
        Ok(hasher)
    }

    fn argon2(&self) -> Result<Argon2<'_>, RenewalError> {
        Argon2::new_with_secret(
            &self.pepper,
            Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
        .map_err(|e| RenewalError::Params(e.to_string()))
    }

    /// Hashes a credential with a fresh random salt, returning a PHC string.
    pub fn hash(&self, credential: &str) -> Result<String, RenewalError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()?
            .hash_password(credential.as_bytes(), &salt)
            .map_err(|e| RenewalError::Hashing(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Checks a presented credential against a stored PHC hash.
    ///
    /// The digest comparison is constant time. `Ok(false)` means mismatch;
    /// `Err` means the stored hash itself is unusable.
    pub fn verify(&self, credential: &str, stored_hash: &str) -> Result<bool, RenewalError> {
        let parsed =
            PasswordHash::new(stored_hash).map_err(|e| RenewalError::MalformedHash(e.to_string()))?;

        match self.argon2()?.verify_password(credential.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(RenewalError::Hashing(e.to_string())),
        }
    }
}
