//! Error types for the GitHub client.

use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for GitHub client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// One field-level problem reported by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.resource, self.field, self.code)?;
        if let Some(message) = &self.message {
            write!(f, " ({message})")?;
        }
        Ok(())
    }
}

/// A GitHub API error response body.
///
/// See <https://docs.github.com/en/rest/overview/resources-in-the-rest-api#client-errors>.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,
}

impl fmt::Display for GithubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "github: {}", self.message)?;
        if !self.errors.is_empty() {
            let fields: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
            write!(f, " [{}]", fields.join(", "))?;
        }
        if let Some(url) = &self.documentation_url {
            write!(f, " {url}")?;
        }
        Ok(())
    }
}

impl std::error::Error for GithubError {}

/// Errors that can occur while talking to the GitHub API.
#[derive(Error, Debug)]
pub enum Error {
    /// The API rejected the request and explained why.
    #[error("{error} (status {status})")]
    Api {
        status: StatusCode,
        error: GithubError,
    },

    /// The API answered with an unexpected status and no body.
    #[error("unexpected status: {status}")]
    UnexpectedStatus { status: StatusCode },

    /// The API answered with an unexpected status and a body that is not an API error.
    #[error("unexpected status: {status}: {reason}")]
    UndecodableError { status: StatusCode, reason: String },

    /// Transport failure: DNS, connect, TLS, total timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// No response headers arrived in time.
    #[error("request timed out after {timeout_ms}ms waiting for response headers")]
    Timeout { timeout_ms: u64 },

    /// The configured API URL is unusable.
    #[error("invalid API URL '{url}': {reason}")]
    InvalidApiUrl { url: String, reason: String },

    /// The token contains characters that cannot go in a header.
    #[error("token is not a valid header value")]
    InvalidToken,

    /// The verbose tracer could not write or rebuild a message.
    #[error("request trace failed: {reason}")]
    Trace { reason: String },
}

impl Error {
    /// Create an undecodable error body error.
    pub fn undecodable(status: StatusCode, reason: impl Into<String>) -> Self {
        Self::UndecodableError {
            status,
            reason: reason.into(),
        }
    }

    /// Create a response header timeout error.
    pub const fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Create an invalid API URL error.
    pub fn invalid_api_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidApiUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a trace error.
    pub fn trace(reason: impl Into<String>) -> Self {
        Self::Trace {
            reason: reason.into(),
        }
    }

    /// HTTP status returned by the API, if the error came from a response.
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. }
            | Self::UnexpectedStatus { status }
            | Self::UndecodableError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The request never produced a usable response.
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
    }

    /// The client was configured with an unusable URL or token.
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::InvalidApiUrl { .. } | Self::InvalidToken)
    }

    /// The API answered with an error status.
    pub const fn is_api(&self) -> bool {
        self.status().is_some()
    }

    /// The decoded API error body, if there was one.
    pub const fn api_error(&self) -> Option<&GithubError> {
        match self {
            Self::Api { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_error_display() -> std::result::Result<(), serde_json::Error> {
        let body = r#"{
            "message": "Repository creation failed.",
            "errors": [{"resource": "Repository", "field": "name", "code": "custom", "message": "name already exists on this account"}],
            "documentation_url": "https://docs.github.com/rest/repos/repos#create-an-organization-repository"
        }"#;
        let error: GithubError = serde_json::from_str(body)?;
        let text = Error::Api {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            error,
        }
        .to_string();

        assert!(text.starts_with("github: Repository creation failed."));
        assert!(text.contains("Repository.name: custom"));
        assert!(text.contains("422"));
        Ok(())
    }

    #[test]
    fn test_classification() {
        let api = Error::UnexpectedStatus {
            status: StatusCode::BAD_GATEWAY,
        };
        assert!(api.is_api());
        assert!(!api.is_transport());
        assert_eq!(api.status(), Some(StatusCode::BAD_GATEWAY));

        let timeout = Error::timeout(30_000);
        assert!(timeout.is_transport());
        assert!(!timeout.is_api());
        assert_eq!(timeout.status(), None);
    }

    #[test]
    fn test_message_is_required() {
        assert!(serde_json::from_str::<GithubError>("{}").is_err());
    }
}
