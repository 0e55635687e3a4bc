//! Core error types for record validation and manifest loading.
//!
//! All errors are explicit, typed, and recoverable - no panics allowed.

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for ghrepo records.
#[derive(Debug, Error)]
pub enum Error {
    // Validation errors
    #[error("invalid spec: {reason}")]
    InvalidSpec { reason: String },

    // Parsing errors
    #[error("YAML parse error: {reason}")]
    YamlParseFailed { reason: String },

    #[error("unsupported manifest kind '{kind}'")]
    UnsupportedKind { kind: String },

    #[error("manifest document {index} has no 'kind'")]
    MissingKind { index: usize },

    #[error("duplicate {kind} '{name}' in manifest")]
    Duplicate { kind: String, name: String },
}

impl Error {
    /// Create an invalid spec error.
    pub fn invalid_spec(reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            reason: reason.into(),
        }
    }

    /// Create a YAML parse error.
    pub fn yaml_parse_failed(reason: impl Into<String>) -> Self {
        Self::YamlParseFailed {
            reason: reason.into(),
        }
    }

    /// Create an unsupported kind error.
    pub fn unsupported_kind(kind: impl Into<String>) -> Self {
        Self::UnsupportedKind { kind: kind.into() }
    }

    /// Create a duplicate record error.
    pub fn duplicate(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Duplicate {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::yaml_parse_failed(err.to_string())
    }
}
