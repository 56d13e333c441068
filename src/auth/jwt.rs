use std::collections::HashSet;
use std::sync::Arc;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::claims::Claims;
use crate::{clock::Clock, config::JwtConfig, error::AuthError};

/// Issues and verifies HS256 session tokens.
///
/// Expiry is checked against the injected clock with no leeway; the
/// library's own wall-clock `exp` check is switched off.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(config: &JwtConfig, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);
        validation.set_audience(std::slice::from_ref(&config.audience));
        validation.set_issuer(std::slice::from_ref(&config.issuer));

        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: Duration::minutes(config.ttl_minutes),
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, subject: Uuid) -> anyhow::Result<String> {
        self.issue_with_ttl(subject, self.ttl)
    }

    pub fn issue_with_ttl(&self, subject: Uuid, ttl: Duration) -> anyhow::Result<String> {
        let now = self.clock.now();
        let claims = Claims {
            sub: Some(subject.to_string()),
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id = %subject, exp = claims.exp, "jwt signed");
        Ok(token)
    }

    /// Signature first, then expiry, then subject.
    pub fn verify(&self, token: &str) -> Result<Uuid, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidIssuer
                | ErrorKind::InvalidAudience => AuthError::BadSignature,
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Malformed,
            }
        })?;
        let claims = data.claims;

        if claims.exp <= self.clock.now().unix_timestamp() {
            return Err(AuthError::Expired);
        }

        let sub = claims
            .sub
            .filter(|s| !s.trim().is_empty())
            .ok_or(AuthError::MissingSubject)?;
        let user_id = Uuid::parse_str(&sub).map_err(|_| AuthError::Malformed)?;

        debug!(user_id = %user_id, "jwt verified");
        Ok(user_id)
    }
}
