//! Password hashing and verification. Current-format credentials are
//! Argon2id; a legacy salted-SHA-512 format is still recognized so accounts
//! imported from the pre-migration store keep working, and successful
//! logins against it trigger a transparent rehash (driven by the service
//! layer).

use argon2::{
    Algorithm, Argon2, ParamsBuilder, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::error::{AuthError, AuthResult};

const SALT_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    Argon2id,
    LegacySha512,
}

/// Stored password hash plus its format tag. Plaintext never appears here,
/// in logs, or in any return value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub hash: String,
    pub algorithm: HashAlgorithm,
}

#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    pub fn new() -> AuthResult<Self> {
        let mut builder = ParamsBuilder::new();
        builder.m_cost(19 * 1024); // 19 MiB
        builder.t_cost(2);
        builder.p_cost(1);
        let params = builder.build().map_err(AuthError::from)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Ok(Self { argon2 })
    }

    /// Hash a password under the current algorithm.
    pub fn hash_password(&self, password: &str) -> AuthResult<Credential> {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes).map_err(AuthError::from)?;
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(AuthError::from)?
            .to_string();
        Ok(Credential {
            hash,
            algorithm: HashAlgorithm::Argon2id,
        })
    }

    /// Produce a legacy-format credential. Only used when importing
    /// accounts from the pre-migration store and when seeding tests.
    pub fn hash_password_legacy(&self, password: &str) -> Credential {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let digest = legacy_digest(password, &salt);
        Credential {
            hash: format!(
                "{}${}",
                STANDARD_NO_PAD.encode(salt),
                STANDARD_NO_PAD.encode(digest)
            ),
            algorithm: HashAlgorithm::LegacySha512,
        }
    }

    /// Check a candidate password against a stored credential, dispatching
    /// on the format tag. `Ok(false)` means wrong password; `Err` means the
    /// stored hash itself could not be processed.
    pub fn verify_password(&self, password: &str, credential: &Credential) -> AuthResult<bool> {
        match credential.algorithm {
            HashAlgorithm::Argon2id => {
                let parsed = PasswordHash::new(&credential.hash)?;
                match self.argon2.verify_password(password.as_bytes(), &parsed) {
                    Ok(()) => Ok(true),
                    Err(argon2::password_hash::Error::Password) => Ok(false),
                    Err(err) => Err(AuthError::from(err)),
                }
            }
            HashAlgorithm::LegacySha512 => verify_legacy(password, &credential.hash),
        }
    }

    /// True when a successful verification should be followed by a rehash
    /// under the current algorithm.
    pub fn needs_rehash(&self, credential: &Credential) -> bool {
        credential.algorithm != HashAlgorithm::Argon2id
    }
}

fn legacy_digest(password: &str, salt: &[u8]) -> Vec<u8> {
    let mut hasher = Sha512::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

fn verify_legacy(password: &str, stored: &str) -> AuthResult<bool> {
    let (salt_b64, hash_b64) = stored
        .split_once('$')
        .ok_or_else(|| AuthError::PasswordHash("malformed legacy hash".into()))?;
    let salt = STANDARD_NO_PAD
        .decode(salt_b64)
        .map_err(|err| AuthError::PasswordHash(err.to_string()))?;
    let expected = STANDARD_NO_PAD
        .decode(hash_b64)
        .map_err(|err| AuthError::PasswordHash(err.to_string()))?;
    let candidate = legacy_digest(password, &salt);
    Ok(constant_time_eq(&candidate, &expected))
}

/// Constant-time comparison to avoid timing side-channels.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}
