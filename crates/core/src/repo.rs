//! The `Repo` record: a GitHub repository that should exist.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::condition::{Condition, Conditions};
use crate::error::{Error, Result};
use crate::meta::ObjectMeta;

/// API version written on `Repo` records.
pub const REPO_API_VERSION: &str = "repo.ghrepo.io/v1alpha1";

/// Kind name of `Repo` records.
pub const REPO_KIND: &str = "Repo";

const fn default_true() -> bool {
    true
}

/// Desired properties of a repository.
///
/// `organization` and `name` together identify the remote repository and
/// cannot change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoParams {
    /// Owner of the repository: an organization or a user login.
    #[serde(alias = "org")]
    pub organization: String,

    /// Repository name.
    pub name: String,

    /// Whether the repository is private.
    #[serde(default = "default_true")]
    pub private: bool,

    /// Whether GitHub should create an initial commit.
    #[serde(default = "default_true", alias = "initialize")]
    pub auto_init: bool,
}

impl RepoParams {
    /// Params for `organization/name` with the default flags.
    pub fn new(organization: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            name: name.into(),
            private: true,
            auto_init: true,
        }
    }

    /// Set repository visibility.
    #[must_use]
    pub const fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    /// Set whether an initial commit is created.
    #[must_use]
    pub const fn auto_init(mut self, auto_init: bool) -> Self {
        self.auto_init = auto_init;
        self
    }

    /// `organization/name`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.organization, self.name)
    }

    /// Check the identity key is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSpec`] when the organization or the name is
    /// blank, contains a `/`, or is `.` or `..`.
    pub fn validate(&self) -> Result<()> {
        check_segment("organization", &self.organization)?;
        check_segment("name", &self.name)
    }
}

fn check_segment(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid_spec(format!("{field} must not be empty")));
    }
    if value.contains('/') {
        return Err(Error::invalid_spec(format!(
            "{field} '{value}' must not contain '/'"
        )));
    }
    if value == "." || value == ".." {
        return Err(Error::invalid_spec(format!("{field} '{value}' is reserved")));
    }
    Ok(())
}

/// Repository state as reported by GitHub.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoObservation {
    /// Repository URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Whether the repository is private.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
}

/// Reference to a `ProviderConfig` record by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfigReference {
    pub name: String,
}

/// Desired state of a `Repo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config_ref: Option<ProviderConfigReference>,
    pub for_provider: RepoParams,
}

/// Observed state of a `Repo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoStatus {
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,
    #[serde(default)]
    pub at_provider: RepoObservation,
}

/// A managed GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repo {
    #[serde(default = "repo_api_version")]
    pub api_version: String,
    #[serde(default = "repo_kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: RepoSpec,
    #[serde(default)]
    pub status: RepoStatus,
}

fn repo_api_version() -> String {
    REPO_API_VERSION.to_string()
}

fn repo_kind() -> String {
    REPO_KIND.to_string()
}

impl Repo {
    /// A new `Repo` record named `name` with the given params.
    pub fn new(name: impl Into<String>, params: RepoParams) -> Self {
        Self {
            api_version: repo_api_version(),
            kind: repo_kind(),
            metadata: ObjectMeta::named(name),
            spec: RepoSpec {
                provider_config_ref: None,
                for_provider: params,
            },
            status: RepoStatus::default(),
        }
    }

    /// Reference the named provider config.
    #[must_use]
    pub fn with_provider_config(mut self, name: impl Into<String>) -> Self {
        self.spec.provider_config_ref = Some(ProviderConfigReference { name: name.into() });
        self
    }

    /// Record name.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Desired repository params.
    pub const fn params(&self) -> &RepoParams {
        &self.spec.for_provider
    }

    /// Set a status condition.
    pub fn set_condition(&mut self, condition: Condition) {
        self.status.conditions.set(condition);
    }

    /// Whether deletion of this record has been requested.
    pub const fn is_deletion_requested(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Request deletion of this record and its external repository.
    pub fn mark_for_deletion(&mut self) {
        if self.metadata.deletion_timestamp.is_none() {
            self.metadata.deletion_timestamp = Some(Utc::now());
        }
    }
}
