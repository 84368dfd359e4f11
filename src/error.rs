use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

pub type AuthResult<T> = Result<T, AuthError>;

/// Tagged outcome taxonomy for the whole subsystem. Token and credential
/// rejections are terminal for the request; infrastructure failures are
/// retryable and must never be conflated with a security rejection.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown identity or wrong password. Deliberately identical for both
    /// so callers cannot enumerate accounts.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account disabled")]
    AccountDisabled,
    /// Unknown or malformed token. The response does not distinguish
    /// never-existed from structurally bad; logs do.
    #[error("token invalid")]
    TokenInvalid,
    #[error("token expired")]
    TokenExpired,
    /// Reuse of an already-consumed refresh token. By the time this is
    /// returned the token's whole family has been revoked.
    #[error("token reuse detected")]
    SecurityViolation { user_id: Uuid },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("signing error: {0}")]
    Signing(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
}

impl AuthError {
    /// True for infrastructure failures the caller may retry. All token and
    /// credential rejections require new input and must not be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthError::Store(StoreError::Unavailable(_)) | AuthError::Signing(_)
        )
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}
