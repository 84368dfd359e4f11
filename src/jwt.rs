//! Access-token minting and validation. Tokens are stateless HS256 JWTs;
//! validation never touches the store. Two decode paths exist on purpose:
//! the full check used for request authorization, and a variant that
//! forgives expiry (and nothing else) so the holder of a just-expired
//! access token can still authenticate a refresh call.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub role: String,
}

impl AccessTokenClaims {
    pub fn user_id(&self) -> AuthResult<Uuid> {
        self.sub.parse().map_err(|_| AuthError::TokenInvalid)
    }
}

#[derive(Debug, Clone)]
pub struct SignedAccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct JwtMetadata {
    pub kid: Option<String>,
    pub algorithm: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl_secs: i64,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expired_ok_validation: Validation,
    issuer: String,
    audience: String,
    access_token_ttl: Duration,
    kid: Option<String>,
}

impl JwtService {
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        let secret_bytes = config.jwt_secret.as_bytes();
        let encoding_key = EncodingKey::from_secret(secret_bytes);
        let decoding_key = DecodingKey::from_secret(secret_bytes);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[config.audience.clone()]);
        validation.set_issuer(&[config.issuer.clone()]);
        validation.leeway = 30;

        // Same signature/issuer/audience checks, expiry alone forgiven.
        let mut expired_ok_validation = validation.clone();
        expired_ok_validation.validate_exp = false;

        Ok(Self {
            encoding_key,
            decoding_key,
            validation,
            expired_ok_validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_token_ttl: Duration::seconds(config.access_token_ttl_secs),
            kid: config.jwt_kid.clone(),
        })
    }

    pub fn issue_access_token(&self, user_id: Uuid, role: &str) -> AuthResult<SignedAccessToken> {
        let now = Utc::now();
        let expires_at = now + self.access_token_ttl;
        let jti = Uuid::new_v4().to_string();

        let mut header = Header::new(Algorithm::HS256);
        header.kid = self.kid.clone();

        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti,
            role: role.to_string(),
        };

        let token = encode(&header, &claims, &self.encoding_key)
            .map_err(|err| AuthError::Signing(err.to_string()))?;

        Ok(SignedAccessToken { token, expires_at })
    }

    /// Full validation: signature, issuer, audience, expiry.
    pub fn decode_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        let token_data = decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(map_decode_error)?;
        Ok(token_data.claims)
    }

    /// Validation that accepts an expired token. Signature, issuer, and
    /// audience failures are still rejected exactly as in
    /// [`Self::decode_access_token`]; accepting a forged-but-expired token
    /// here would defeat refresh authentication entirely.
    pub fn decode_expired_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        let token_data =
            decode::<AccessTokenClaims>(token, &self.decoding_key, &self.expired_ok_validation)
                .map_err(map_decode_error)?;
        Ok(token_data.claims)
    }

    pub fn metadata(&self) -> JwtMetadata {
        JwtMetadata {
            kid: self.kid.clone(),
            algorithm: "HS256".to_string(),
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            access_token_ttl_secs: self.access_token_ttl.num_seconds(),
        }
    }
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidKeyFormat | ErrorKind::Crypto(_) => AuthError::Signing(err.to_string()),
        _ => AuthError::TokenInvalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_JWT_SECRET: &str = "super-secret-test-key";

    fn make_test_config() -> AuthConfig {
        AuthConfig {
            issuer: "https://auth.test".into(),
            audience: "auth-core".into(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 604800,
            jwt_secret: TEST_JWT_SECRET.into(),
            jwt_kid: Some("test-kid".into()),
        }
    }

    fn issue_with_exp(service: &JwtService, config: &AuthConfig, exp: i64) -> String {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: Uuid::new_v4().to_string(),
            iss: config.issuer.clone(),
            aud: config.audience.clone(),
            exp,
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            role: "user".into(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &service.encoding_key,
        )
        .expect("encode")
    }

    #[test]
    fn issues_and_decodes_access_tokens() {
        let config = make_test_config();
        let service = JwtService::from_config(&config).expect("jwt service");

        let user_id = Uuid::new_v4();
        let token = service
            .issue_access_token(user_id, "user")
            .expect("issue token");

        let claims = service
            .decode_access_token(&token.token)
            .expect("decode token");

        assert_eq!(claims.user_id().expect("uuid sub"), user_id);
        assert_eq!(claims.role, "user");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_rejected_by_full_check_but_parsed_by_expired_path() {
        let config = make_test_config();
        let service = JwtService::from_config(&config).expect("jwt service");

        let stale_exp = (Utc::now() - Duration::hours(2)).timestamp();
        let token = issue_with_exp(&service, &config, stale_exp);

        let full = service.decode_access_token(&token);
        assert!(matches!(full, Err(AuthError::TokenExpired)));

        let claims = service
            .decode_expired_access_token(&token)
            .expect("expired token still parses");
        assert_eq!(claims.exp, stale_exp);
    }

    #[test]
    fn forged_signature_rejected_by_both_paths() {
        let config = make_test_config();
        let service = JwtService::from_config(&config).expect("jwt service");

        let mut forged_config = make_test_config();
        forged_config.jwt_secret = "a-different-key-entirely".into();
        let forger = JwtService::from_config(&forged_config).expect("jwt service");

        let stale_exp = (Utc::now() - Duration::hours(2)).timestamp();
        let forged = issue_with_exp(&forger, &forged_config, stale_exp);

        assert!(matches!(
            service.decode_access_token(&forged),
            Err(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            service.decode_expired_access_token(&forged),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn wrong_issuer_rejected_even_when_expiry_is_forgiven() {
        let config = make_test_config();
        let service = JwtService::from_config(&config).expect("jwt service");

        let mut other_config = make_test_config();
        other_config.issuer = "https://somewhere-else.test".into();
        let other = JwtService::from_config(&other_config).expect("jwt service");

        let token = other
            .issue_access_token(Uuid::new_v4(), "user")
            .expect("issue token");

        assert!(matches!(
            service.decode_access_token(&token.token),
            Err(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            service.decode_expired_access_token(&token.token),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn metadata_reflects_the_configuration() {
        let config = make_test_config();
        let service = JwtService::from_config(&config).expect("jwt service");

        let meta = service.metadata();
        assert_eq!(meta.kid.as_deref(), Some("test-kid"));
        assert_eq!(meta.algorithm, "HS256");
        assert_eq!(meta.issuer, config.issuer);
        assert_eq!(meta.audience, config.audience);
        assert_eq!(meta.access_token_ttl_secs, config.access_token_ttl_secs);
    }

    #[test]
    fn wrong_audience_rejected_even_when_expiry_is_forgiven() {
        let config = make_test_config();
        let service = JwtService::from_config(&config).expect("jwt service");

        let mut other_config = make_test_config();
        other_config.audience = "some-other-api".into();
        let other = JwtService::from_config(&other_config).expect("jwt service");

        let token = other
            .issue_access_token(Uuid::new_v4(), "user")
            .expect("issue token");

        assert!(matches!(
            service.decode_access_token(&token.token),
            Err(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            service.decode_expired_access_token(&token.token),
            Err(AuthError::TokenInvalid)
        ));
    }
}
