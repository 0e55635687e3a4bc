//! The managed-resource capability set.
//!
//! A managed resource kind plugs into the host by implementing [`Managed`]
//! and providing an [`ExternalConnector`]. The connector turns a record into
//! an [`ExternalClient`] that the host drives through observe, create, update
//! and delete.

use std::fmt;

use async_trait::async_trait;
use ghrepo_core::{Condition, Conditions, REPO_KIND, Repo};

use crate::error::Result;

/// `kind/name` of a managed record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceRef {
    pub kind: String,
    pub name: String,
}

impl ResourceRef {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// A desired-state record whose external counterpart is reconciled.
pub trait Managed: Clone + Send + Sync + 'static {
    /// The kind this implementation handles.
    const KIND: &'static str;

    /// The kind the record itself declares.
    fn declared_kind(&self) -> &str;

    /// Record name, unique within the kind.
    fn name(&self) -> &str;

    /// Name of the provider config the record uses, if any.
    fn provider_config_ref(&self) -> Option<&str>;

    fn conditions(&self) -> &Conditions;

    fn set_condition(&mut self, condition: Condition);

    /// Whether the record, and with it the external resource, should go away.
    fn is_deletion_requested(&self) -> bool;

    fn resource_ref(&self) -> ResourceRef {
        ResourceRef::new(Self::KIND, self.name())
    }
}

impl Managed for Repo {
    const KIND: &'static str = REPO_KIND;

    fn declared_kind(&self) -> &str {
        &self.kind
    }

    fn name(&self) -> &str {
        Self::name(self)
    }

    fn provider_config_ref(&self) -> Option<&str> {
        self.spec
            .provider_config_ref
            .as_ref()
            .map(|reference| reference.name.as_str())
    }

    fn conditions(&self) -> &Conditions {
        &self.status.conditions
    }

    fn set_condition(&mut self, condition: Condition) {
        Self::set_condition(self, condition);
    }

    fn is_deletion_requested(&self) -> bool {
        Self::is_deletion_requested(self)
    }
}

/// What an observation found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalObservation {
    /// The external resource exists.
    pub resource_exists: bool,
    /// The external resource matches the desired state.
    pub resource_up_to_date: bool,
}

impl ExternalObservation {
    /// The resource exists and needs nothing.
    pub const fn present() -> Self {
        Self {
            resource_exists: true,
            resource_up_to_date: true,
        }
    }

    /// The resource does not exist yet.
    pub const fn absent() -> Self {
        Self {
            resource_exists: false,
            resource_up_to_date: true,
        }
    }
}

/// Result of a successful create.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExternalCreation;

/// Result of a successful update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExternalUpdate;

/// Produces an [`ExternalClient`] for one reconciliation of a record.
#[async_trait]
pub trait ExternalConnector<M: Managed>: Send + Sync {
    /// Resolve credentials for `resource` and build a client session.
    async fn connect(&self, resource: &M) -> Result<Box<dyn ExternalClient<M>>>;
}

/// Operations on the external counterpart of a record.
///
/// Each call may record status on the resource; the host persists it.
#[async_trait]
pub trait ExternalClient<M: Managed>: Send + Sync {
    async fn observe(&self, resource: &mut M) -> Result<ExternalObservation>;

    async fn create(&self, resource: &mut M) -> Result<ExternalCreation>;

    async fn update(&self, resource: &mut M) -> Result<ExternalUpdate>;

    /// Remove the external resource. Removing an absent resource succeeds.
    async fn delete(&self, resource: &mut M) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghrepo_core::{ConditionReason, ConditionType, RepoParams};

    #[test]
    fn test_repo_is_managed() {
        let mut repo = Repo::new("widgets", RepoParams::new("acme", "widgets"))
            .with_provider_config("default");

        assert_eq!(<Repo as Managed>::KIND, "Repo");
        assert_eq!(repo.declared_kind(), "Repo");
        assert_eq!(Managed::provider_config_ref(&repo), Some("default"));
        assert_eq!(repo.resource_ref().to_string(), "Repo/widgets");

        Managed::set_condition(&mut repo, Condition::available());
        assert_eq!(
            Managed::conditions(&repo)
                .get(ConditionType::Ready)
                .map(|c| c.reason),
            Some(ConditionReason::Available)
        );
    }

    #[test]
    fn test_observation_constructors() {
        assert!(ExternalObservation::present().resource_exists);
        assert!(!ExternalObservation::absent().resource_exists);
        assert!(ExternalObservation::absent().resource_up_to_date);
    }
}
