use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    auth::{claims::Claims, errors::TokenError},
    config::JwtConfig,
};

/// Signs and validates HS256 identity tokens from the process-wide secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    issuer: String,
    ttl: Duration,
    leeway: i64,
}

impl TokenIssuer {
    pub fn new(cfg: &JwtConfig) -> Result<Self, TokenError> {
        let secret = match cfg.secret.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => {
                warn!("JWT secret missing, refusing to construct token issuer");
                return Err(TokenError::MissingSigningSecret);
            }
        };
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            algorithm: Algorithm::HS256,
            issuer: cfg.issuer.clone(),
            ttl: cfg.ttl,
            leeway: i64::try_from(cfg.leeway_seconds).unwrap_or(i64::MAX),
        })
    }

    /// Forces a header algorithm that does not match the HMAC key, so signing fails.
    #[cfg(test)]
    pub(crate) fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn issue(&self, user_id: Uuid, username: &str, email: &str) -> Result<String, TokenError> {
        self.issue_at(user_id, username, email, OffsetDateTime::now_utc())
    }

    pub fn issue_at(
        &self,
        user_id: Uuid,
        username: &str,
        email: &str,
        now: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let iat = now.unix_timestamp();
        let ttl = i64::try_from(self.ttl.as_secs())
            .map_err(|_| TokenError::SigningFailure("token lifetime out of range".into()))?;
        let claims = Claims {
            sub: user_id,
            username: username.to_owned(),
            email: email.to_owned(),
            iat,
            nbf: iat,
            exp: iat.saturating_add(ttl),
            iss: self.issuer.clone(),
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| TokenError::SigningFailure(e.to_string()))?;
        debug!(user_id = %user_id, exp = claims.exp, "jwt signed");
        Ok(token)
    }

    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_at(token, OffsetDateTime::now_utc())
    }

    /// Signature and issuer are checked by `jsonwebtoken`; the time window is
    /// checked here against `now` so expiry and not-before stay distinguishable.
    pub fn validate_at(&self, token: &str, now: OffsetDateTime) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "nbf", "sub", "iss"]);

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| {
                debug!(error = %e, "jwt rejected");
                TokenError::InvalidSignature
            })?
            .claims;

        let now = now.unix_timestamp();
        if now > claims.exp.saturating_add(self.leeway) {
            debug!(user_id = %claims.sub, "jwt expired");
            return Err(TokenError::Expired);
        }
        if now.saturating_add(self.leeway) < claims.nbf {
            debug!(user_id = %claims.sub, "jwt not yet valid");
            return Err(TokenError::NotYetValid);
        }

        debug!(user_id = %claims.sub, "jwt verified");
        Ok(claims)
    }
}
