//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Why a settings file could not be turned into [`HuddleSettings`].
///
/// [`HuddleSettings`]: crate::HuddleSettings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid JSON or does not fit the settings shape.
    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),
    /// A value is well-formed but unusable, such as a zero queue capacity.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

/// Result alias for the settings crate.
pub type Result<T> = std::result::Result<T, SettingsError>;
