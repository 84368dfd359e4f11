//! The external surface of the subsystem: login, refresh, logout, and
//! local access-token validation, wired over the collaborator traits.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::jwt::{AccessTokenClaims, JwtService};
use crate::passwords::PasswordService;
use crate::rotation::RotationEngine;
use crate::session::SessionRegistrar;
use crate::store::RefreshTokenStore;
use crate::users::{Role, UserDirectory, UserRecord};

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshOutcome {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
}

pub struct AuthService {
    passwords: PasswordService,
    jwt: JwtService,
    engine: RotationEngine,
    users: Arc<dyn UserDirectory>,
    sessions: Arc<dyn SessionRegistrar>,
}

impl AuthService {
    pub fn new(
        config: &AuthConfig,
        store: Arc<dyn RefreshTokenStore>,
        users: Arc<dyn UserDirectory>,
        sessions: Arc<dyn SessionRegistrar>,
    ) -> AuthResult<Self> {
        let passwords = PasswordService::new()?;
        let jwt = JwtService::from_config(config)?;
        let engine = RotationEngine::new(
            store,
            Duration::seconds(config.refresh_token_ttl_secs),
        );

        Ok(Self {
            passwords,
            jwt,
            engine,
            users,
            sessions,
        })
    }

    /// Verify the credentials, upgrade a legacy hash if one was used, and
    /// start a new refresh-token family. Session registration runs last and
    /// never fails the login.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        client_ip: &str,
        user_agent: &str,
    ) -> AuthResult<LoginOutcome> {
        let username = username.trim().to_lowercase();

        let user = self
            .users
            .find_by_username(&username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if user.disabled {
            return Err(AuthError::AccountDisabled);
        }

        if !self.passwords.verify_password(password, &user.credential)? {
            return Err(AuthError::InvalidCredentials);
        }

        if self.passwords.needs_rehash(&user.credential) {
            self.upgrade_credential(&user, password).await;
        }

        let now = Utc::now();
        let access = self.jwt.issue_access_token(user.id, user.role.as_str())?;
        let refresh = self.engine.issue_family(user.id, client_ip, now).await?;

        if let Err(err) = self.sessions.register(user.id, client_ip, user_agent).await {
            log::warn!("session registration failed for user {}: {}", user.id, err);
        }

        Ok(LoginOutcome {
            access_token: access.token,
            access_token_expires_at: access.expires_at,
            refresh_token: refresh.token,
            refresh_token_expires_at: refresh.expires_at,
            user: UserSummary {
                id: user.id,
                username: user.username,
                display_name: user.display_name,
                role: user.role,
            },
        })
    }

    /// Rotate the presented refresh token and mint a fresh access token for
    /// its owner. Reuse detection and family revocation live in the engine.
    pub async fn refresh(&self, refresh_token: &str, client_ip: &str) -> AuthResult<RefreshOutcome> {
        let now = Utc::now();
        let rotation = self.engine.rotate(refresh_token, client_ip, now).await?;

        let user = self
            .users
            .find_by_id(rotation.user_id)
            .await?
            .ok_or(AuthError::TokenInvalid)?;
        if user.disabled {
            return Err(AuthError::AccountDisabled);
        }

        let access = self.jwt.issue_access_token(user.id, user.role.as_str())?;

        Ok(RefreshOutcome {
            access_token: access.token,
            access_token_expires_at: access.expires_at,
            refresh_token: rotation.new_token.token,
            refresh_token_expires_at: rotation.new_token.expires_at,
        })
    }

    /// Revoke the presented token and every other active token the user
    /// holds. A logout invalidates every session, not just the current
    /// family.
    pub async fn logout(
        &self,
        user_id: Uuid,
        refresh_token: &str,
        client_ip: &str,
    ) -> AuthResult<()> {
        self.engine.logout(user_id, refresh_token, client_ip).await?;
        Ok(())
    }

    /// Local signature-and-expiry check; never touches the store.
    pub fn validate_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        self.jwt.decode_access_token(token)
    }

    /// Parse claims out of a possibly-expired access token, with signature,
    /// issuer, and audience still enforced. Used to authenticate the holder
    /// during a refresh call.
    pub fn claims_from_expired_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        self.jwt.decode_expired_access_token(token)
    }

    async fn upgrade_credential(&self, user: &UserRecord, password: &str) {
        // Best-effort security upgrade: never blocks the login.
        match self.passwords.hash_password(password) {
            Ok(credential) => {
                match self.users.update_credential(user.id, credential).await {
                    Ok(()) => log::info!("upgraded legacy credential for user {}", user.id),
                    Err(err) => log::warn!(
                        "failed to persist upgraded credential for user {}: {}",
                        user.id,
                        err
                    ),
                }
            }
            Err(err) => {
                log::warn!("failed to rehash legacy credential for user {}: {}", user.id, err);
            }
        }
    }
}
