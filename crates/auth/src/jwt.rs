//! HS256 bearer token validation.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use thiserror::Error;

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Bad signature, wrong algorithm, or undecodable payload.
    #[error("invalid token: {0}")]
    Malformed(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Turns a raw bearer token into validated claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, AuthError>;
}

/// Shared-secret (HS256) validator.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time checks run in `validate_claims` against the caller's clock.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "bearer token rejected");
            AuthError::Malformed(e.to_string())
        })?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}
