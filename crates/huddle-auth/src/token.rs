//! HS256 token encoding and validation.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use huddle_core::UserId;

use crate::errors::{AuthError, Result};

/// Claims carried by a huddle bearer token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric user id, resolved through the user directory.
    pub user_id: u64,
    /// Email the token was issued for.
    pub email: String,
    /// Expiry as unix seconds.
    pub exp: i64,
}

/// Signs and validates HS256 tokens with a shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from the configured secret.
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Mint a token for `user_id` that expires `ttl_secs` from now.
    pub fn encode(&self, user_id: UserId, email: &str, ttl_secs: u64) -> Result<String> {
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        let exp = Utc::now().timestamp().saturating_add(ttl);
        self.encode_with_expiry(user_id, email, exp)
    }

    /// Mint a token with an explicit expiry (unix seconds).
    pub fn encode_with_expiry(&self, user_id: UserId, email: &str, exp: i64) -> Result<String> {
        let claims = Claims {
            user_id: user_id.0,
            email: email.to_string(),
            exp,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Validate signature and expiry, returning the claims.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!(error = %e, "token validation failed");
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;
        Ok(data.claims)
    }
}
