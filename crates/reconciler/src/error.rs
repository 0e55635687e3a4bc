//! Error types for the reconciler crate.

use ghrepo_core::CredentialsSource;
use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
#[derive(Debug, Error)]
pub enum Error {
    /// The managed resource names no provider config.
    #[error("no providerConfigRef is set")]
    MissingProviderConfigRef,

    /// The referenced provider config could not be fetched.
    #[error("cannot get referenced provider config '{name}': {reason}")]
    GetProviderConfig { name: String, reason: String },

    /// Usage of the provider config could not be recorded.
    #[error("cannot track provider config usage: {reason}")]
    TrackUsage { reason: String },

    /// Credentials come from somewhere other than a secret.
    #[error("credentials source {kind} is not currently supported")]
    UnsupportedCredentialsSource { kind: CredentialsSource },

    /// Secret credentials were selected but no secret is referenced.
    #[error("no credentials secret referenced")]
    NoSecretRef,

    /// The credentials secret could not be read.
    #[error("cannot get credentials secret {selector}: {reason}")]
    SecretFetch { selector: String, reason: String },

    /// The record handed to a connector is of another kind.
    #[error("managed resource is not a {expected} custom resource (got '{actual}')")]
    WrongKind { expected: String, actual: String },

    /// The desired state cannot be acted on.
    #[error("invalid spec: {reason}")]
    InvalidSpec { reason: String },

    /// A record does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    /// A provider config cannot be removed while resources use it.
    #[error("provider config '{name}' is still in use by {users}")]
    ConfigInUse { name: String, users: String },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// GitHub API or transport failure.
    #[error(transparent)]
    Github(#[from] ghrepo_github::Error),
}

impl Error {
    /// Create a provider config fetch error.
    pub fn get_provider_config(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GetProviderConfig {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a usage tracking error.
    pub fn track_usage(reason: impl Into<String>) -> Self {
        Self::TrackUsage {
            reason: reason.into(),
        }
    }

    /// Create a secret fetch error.
    pub fn secret_fetch(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SecretFetch {
            selector: selector.into(),
            reason: reason.into(),
        }
    }

    /// Create a wrong kind error.
    pub fn wrong_kind(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::WrongKind {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an invalid spec error.
    pub fn invalid_spec(reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            reason: reason.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether the error comes from provider configuration rather than from
    /// talking to GitHub.
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::MissingProviderConfigRef
                | Self::GetProviderConfig { .. }
                | Self::TrackUsage { .. }
                | Self::UnsupportedCredentialsSource { .. }
                | Self::NoSecretRef
                | Self::SecretFetch { .. }
        ) || matches!(self, Self::Github(e) if e.is_config())
    }

    /// Whether the error is a missing record.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
