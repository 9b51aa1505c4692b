//! Request rejections and hub errors.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use huddle_auth::AuthError;

/// Reasons a `/ws` request is refused before the upgrade.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The `room` query parameter is absent or empty.
    #[error("missing room parameter")]
    MissingRoom,

    /// The credential was absent, malformed, invalid, expired or unknown.
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),
}

impl SessionError {
    /// HTTP status for this rejection.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingRoom => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Machine-readable code, also used as the rejection metric label.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingRoom => "missing_room",
            Self::Unauthorized(e) => e.code(),
        }
    }
}

/// JSON body of a rejection.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Stable error code.
    pub code: String,
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.to_string(),
            code: self.code().to_string(),
        });
        (self.status(), body).into_response()
    }
}

/// The hub control loop has stopped.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("hub is not running")]
pub struct HubClosed;
