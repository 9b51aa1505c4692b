//! Credential → identity resolution.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use huddle_core::UserId;

use crate::directory::UserDirectory;
use crate::errors::{AuthError, Result};
use crate::token::TokenCodec;

/// Who is on the other end of a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Authenticated user id.
    pub user_id: UserId,
    /// Name attached to every message this user sends.
    pub display_name: String,
}

/// Validates a bearer credential and resolves it to an [`Identity`].
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate a raw token (without the `Bearer` prefix).
    async fn authenticate(&self, token: &str) -> Result<Identity>;
}

/// JWT validation backed by a [`UserDirectory`].
pub struct JwtAuthenticator {
    codec: TokenCodec,
    directory: Arc<dyn UserDirectory>,
}

impl JwtAuthenticator {
    /// Create an authenticator from a codec and a directory.
    pub fn new(codec: TokenCodec, directory: Arc<dyn UserDirectory>) -> Self {
        Self { codec, directory }
    }

    /// The codec used for validation.
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity> {
        if token.is_empty() {
            return Err(AuthError::MissingCredential);
        }
        let claims = self.codec.decode(token)?;
        let user_id = UserId(claims.user_id);
        let record = self
            .directory
            .find(user_id)
            .await
            .ok_or(AuthError::UserNotFound(claims.user_id))?;

        debug!(%user_id, "authenticated");
        Ok(Identity {
            user_id,
            display_name: record.name,
        })
    }
}
