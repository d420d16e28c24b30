//! Platform authentication helpers.
//!
//! Access and refresh tokens are HS256 JWTs signed with one shared secret;
//! the `typ` claim keeps a refresh token from being replayed as an access
//! token. Passwords are stored as argon2 PHC strings.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthnError {
    #[error("token is invalid or expired")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),
    #[error("expected a {expected:?} token")]
    WrongTokenType { expected: TokenType },
    #[error("could not sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("password hashing failed: {0}")]
    Hash(String),
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub secret: Vec<u8>,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

impl AuthConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl_minutes: 60,
            refresh_ttl_days: 7,
        }
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(&self.secret)
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.secret)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: String,
    pub typ: TokenType,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

fn issue(
    user_id: Uuid,
    role: &str,
    typ: TokenType,
    ttl: Duration,
    config: &AuthConfig,
) -> Result<String, AuthnError> {
    let now = Utc::now();
    let exp = now.checked_add_signed(ttl).unwrap_or(now).timestamp() as usize;
    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        typ,
        exp,
        iat: now.timestamp() as usize,
    };
    jsonwebtoken::encode(&Header::default(), &claims, &config.encoding_key())
        .map_err(AuthnError::Signing)
}

pub fn issue_access(user_id: Uuid, role: &str, config: &AuthConfig) -> Result<String, AuthnError> {
    issue(
        user_id,
        role,
        TokenType::Access,
        Duration::minutes(config.access_ttl_minutes),
        config,
    )
}

pub fn issue_refresh(
    user_id: Uuid,
    role: &str,
    config: &AuthConfig,
) -> Result<String, AuthnError> {
    issue(
        user_id,
        role,
        TokenType::Refresh,
        Duration::days(config.refresh_ttl_days),
        config,
    )
}

pub fn issue_pair(user_id: Uuid, role: &str, config: &AuthConfig) -> Result<TokenPair, AuthnError> {
    Ok(TokenPair {
        access: issue_access(user_id, role, config)?,
        refresh: issue_refresh(user_id, role, config)?,
    })
}

pub fn decode(token: &str, expected: TokenType, config: &AuthConfig) -> Result<Claims, AuthnError> {
    let claims =
        jsonwebtoken::decode::<Claims>(token, &config.decoding_key(), &Validation::default())
            .map(|data| data.claims)
            .map_err(AuthnError::InvalidToken)?;
    if claims.typ != expected {
        return Err(AuthnError::WrongTokenType { expected });
    }
    Ok(claims)
}

pub fn hash_password(password: &str) -> Result<String, AuthnError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthnError::Hash(err.to_string()))
}

/// False for a wrong password and for a malformed stored hash alike.
pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::new(b"0123456789abcdef0123456789abcdef".to_vec())
    }

    #[test]
    fn access_tokens_roundtrip() {
        let id = Uuid::new_v4();
        let token = issue_access(id, "MANAGER", &config()).unwrap();
        let claims = decode(&token, TokenType::Access, &config()).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, "MANAGER");
    }

    #[test]
    fn refresh_tokens_are_not_access_tokens() {
        let pair = issue_pair(Uuid::new_v4(), "CALLING_AGENT", &config()).unwrap();
        assert!(matches!(
            decode(&pair.refresh, TokenType::Access, &config()),
            Err(AuthnError::WrongTokenType { .. })
        ));
        assert!(decode(&pair.refresh, TokenType::Refresh, &config()).is_ok());
    }

    #[test]
    fn foreign_signatures_are_rejected() {
        let token = issue_access(Uuid::new_v4(), "MANAGER", &config()).unwrap();
        let other = AuthConfig::new(b"another-secret-another-secret-xx".to_vec());
        assert!(matches!(
            decode(&token, TokenType::Access, &other),
            Err(AuthnError::InvalidToken(_))
        ));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let mut cfg = config();
        cfg.access_ttl_minutes = -10;
        let token = issue_access(Uuid::new_v4(), "MANAGER", &cfg).unwrap();
        assert!(decode(&token, TokenType::Access, &cfg).is_err());
    }

    #[test]
    fn passwords_verify_against_their_hash() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(verify_password("s3cret-pass", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret-pass", "not-a-phc-string"));
    }
}
