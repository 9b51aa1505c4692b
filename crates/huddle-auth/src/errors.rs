//! Auth error types.

/// Errors that can occur while validating a credential or loading users.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credential was supplied.
    #[error("missing credential")]
    MissingCredential,

    /// An `Authorization` header was present but not `Bearer <token>`.
    #[error("invalid authorization header format")]
    MalformedHeader,

    /// The token failed signature or structure validation.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The token's `exp` is in the past.
    #[error("token expired")]
    TokenExpired,

    /// The token is valid but its user is unknown.
    #[error("user not found: {0}")]
    UserNotFound(u64),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Signing a new token failed.
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl AuthError {
    /// Stable machine-readable code for rejection responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::MalformedHeader => "invalid_auth_header",
            Self::InvalidToken(_) => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::UserNotFound(_) => "user_not_found",
            Self::Io(_) | Self::Json(_) | Self::Signing(_) => "auth_unavailable",
        }
    }
}

/// Result type for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
