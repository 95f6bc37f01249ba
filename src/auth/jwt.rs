use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use time::{Duration, OffsetDateTime};
use tracing::{debug, error};
use uuid::Uuid;

use crate::auth::{claims::Claims, error::AuthError};
use crate::config::JwtConfig;

/// Why a presented token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("expired token")]
    Expired,
}

/// Issues and verifies self-contained session tokens.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, user_id: Uuid) -> Result<String, AuthError>;
    fn verify(&self, token: &str) -> Result<Claims, TokenError>;
}

/// HS256 signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::minutes(cfg.ttl_minutes),
        }
    }

    /// Signs a token as if issued at `now`.
    pub fn issue_at(&self, user_id: Uuid, now: OffsetDateTime) -> Result<String, AuthError> {
        let exp = now + self.ttl;
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp().max(0) as usize,
            exp: exp.unix_timestamp().max(0) as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            error!(error = %e, "jwt encode failed");
            AuthError::Internal
        })?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation
    }
}

impl TokenIssuer for JwtKeys {
    fn issue(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.issue_at(user_id, OffsetDateTime::now_utc())
    }

    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation()).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}
