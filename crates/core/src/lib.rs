#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # ghrepo-core
//!
//! Desired-state records for the ghrepo controller.
//!
//! - [`Repo`]: a repository that should exist on GitHub.
//! - [`ProviderConfig`]: API URL and credentials shared by repos.
//! - [`Secret`]: token storage referenced by provider configs.
//!
//! Records are usually loaded from a multi-document YAML [`Manifest`].

pub mod condition;
pub mod error;
pub mod manifest;
pub mod meta;
pub mod provider;
pub mod repo;

pub use condition::{Condition, ConditionReason, ConditionStatus, ConditionType, Conditions};
pub use error::{Error, Result};
pub use manifest::Manifest;
pub use meta::{DEFAULT_NAMESPACE, ObjectMeta};
pub use provider::{
    CredentialsSource, PROVIDER_CONFIG_KIND, ProviderConfig, ProviderConfigSpec,
    ProviderCredentials, SECRET_KIND, Secret, SecretKeySelector, SecretSource,
};
pub use repo::{
    ProviderConfigReference, REPO_API_VERSION, REPO_KIND, Repo, RepoObservation, RepoParams,
    RepoSpec, RepoStatus,
};
