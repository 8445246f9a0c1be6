//! Session tokens
//!
//! A session is an HS256 JWT naming the user, held by the browser in a
//! cookie. Logging out revokes the token id in memory until it would have
//! expired anyway.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// HMAC signing secret
    pub secret: Vec<u8>,
    /// Token lifetime in seconds
    pub ttl_seconds: u64,
}

impl SessionConfig {
    /// Use the configured secret, or a fresh random one for this process
    ///
    /// With a random secret every restart logs all users out.
    pub fn new(secret: Option<&str>, ttl_seconds: u64) -> Self {
        let secret = match secret {
            Some(secret) if !secret.is_empty() => secret.as_bytes().to_vec(),
            _ => {
                warn!("No session secret configured, generating a per-process secret");
                let mut bytes = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut bytes);
                bytes
            }
        };
        Self {
            secret,
            ttl_seconds,
        }
    }
}

/// Session claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Username
    pub sub: String,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token id, used for revocation
    pub jti: Uuid,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("token has been revoked")]
    Revoked,

    #[error("system clock error: {0}")]
    Clock(#[from] std::time::SystemTimeError),
}

fn now() -> Result<u64, SessionError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Issues, validates and revokes session tokens
#[derive(Clone)]
pub struct SessionService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_seconds: u64,
    /// Revoked token ids and their expiry
    revoked: Arc<Mutex<HashMap<Uuid, u64>>>,
}

impl SessionService {
    pub fn new(config: SessionConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(&config.secret),
            decoding_key: DecodingKey::from_secret(&config.secret),
            validation,
            ttl_seconds: config.ttl_seconds,
            revoked: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Issue a token for a user
    pub fn issue(&self, username: &str) -> Result<String, SessionError> {
        let iat = now()?;
        let claims = Claims {
            sub: username.to_string(),
            iat,
            exp: iat + self.ttl_seconds,
            jti: Uuid::new_v4(),
        };
        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Validate signature, expiry and revocation
    pub async fn validate(&self, token: &str) -> Result<Claims, SessionError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims;
        if self.revoked.lock().await.contains_key(&claims.jti) {
            return Err(SessionError::Revoked);
        }
        Ok(claims)
    }

    /// Revoke a token until its natural expiry
    pub async fn revoke(&self, claims: &Claims) -> Result<(), SessionError> {
        let now = now()?;
        let mut revoked = self.revoked.lock().await;
        revoked.retain(|_, exp| *exp > now);
        revoked.insert(claims.jti, claims.exp);
        info!("Revoked session for user: {}", claims.sub);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(ttl_seconds: u64) -> SessionService {
        SessionService::new(SessionConfig::new(Some("test-secret"), ttl_seconds))
    }

    #[tokio::test]
    async fn test_issue_and_validate() {
        let sessions = service(60);
        let token = sessions.issue("alice").unwrap();

        let claims = sessions.validate(&token).await.unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.exp - claims.iat, 60);
    }

    #[tokio::test]
    async fn test_tokens_from_another_secret_are_rejected() {
        let token = service(60).issue("alice").unwrap();
        let other = SessionService::new(SessionConfig::new(Some("other-secret"), 60));

        assert!(matches!(
            other.validate(&token).await,
            Err(SessionError::Token(_))
        ));
    }

    #[tokio::test]
    async fn test_random_secret_is_generated() {
        let config = SessionConfig::new(None, 60);
        assert_eq!(config.secret.len(), 32);
        let sessions = SessionService::new(config);
        let token = sessions.issue("bob").unwrap();
        assert!(sessions.validate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_revoked_token_is_rejected() {
        let sessions = service(60);
        let token = sessions.issue("alice").unwrap();
        let claims = sessions.validate(&token).await.unwrap();

        sessions.revoke(&claims).await.unwrap();

        assert!(matches!(
            sessions.validate(&token).await,
            Err(SessionError::Revoked)
        ));
        let fresh = sessions.issue("alice").unwrap();
        assert!(sessions.validate(&fresh).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let sessions = service(60);
        let iat = now().unwrap() - 120;
        let claims = Claims {
            sub: "alice".to_string(),
            iat,
            exp: iat + 60,
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &sessions.encoding_key).unwrap();

        assert!(sessions.validate(&token).await.is_err());
    }
}
