//! The `Repo` engine: connects a `Repo` record to GitHub and implements its
//! external operations.
//!
//! Identity is `organization/name`. Observation checks existence only; drift
//! in `private` or `autoInit` after creation is reported in the logs but
//! never corrected, and update is a no-op.

use std::sync::Arc;

use async_trait::async_trait;
use ghrepo_core::{Condition, REPO_KIND, Repo, RepoObservation};
use ghrepo_github::GithubClient;
use tracing::{debug, info};

use crate::config::ConfigResolver;
use crate::error::{Error, Result};
use crate::events::{Event, EventReason, EventRecorder};
use crate::managed::{
    ExternalClient, ExternalConnector, ExternalCreation, ExternalObservation, ExternalUpdate,
    Managed,
};

/// Connects `Repo` records to GitHub.
pub struct RepoConnector {
    resolver: Arc<ConfigResolver>,
    recorder: Arc<dyn EventRecorder>,
}

impl RepoConnector {
    pub fn new(resolver: Arc<ConfigResolver>, recorder: Arc<dyn EventRecorder>) -> Self {
        Self { resolver, recorder }
    }
}

#[async_trait]
impl ExternalConnector<Repo> for RepoConnector {
    async fn connect(&self, resource: &Repo) -> Result<Box<dyn ExternalClient<Repo>>> {
        if resource.declared_kind() != REPO_KIND {
            return Err(Error::wrong_kind(REPO_KIND, resource.declared_kind()));
        }
        resource
            .params()
            .validate()
            .map_err(|e| Error::invalid_spec(e.to_string()))?;

        let options = self.resolver.resolve(resource).await?;
        let client = GithubClient::new(options)?;

        Ok(Box::new(RepoExternal::new(client, Arc::clone(&self.recorder))))
    }
}

/// One reconciliation session against GitHub for a `Repo`.
pub struct RepoExternal {
    client: GithubClient,
    recorder: Arc<dyn EventRecorder>,
}

impl RepoExternal {
    pub fn new(client: GithubClient, recorder: Arc<dyn EventRecorder>) -> Self {
        Self { client, recorder }
    }

    fn record(&self, resource: &Repo, reason: EventReason, message: String) {
        self.recorder
            .record(Event::normal(resource.resource_ref(), reason, message));
    }
}

#[async_trait]
impl ExternalClient<Repo> for RepoExternal {
    async fn observe(&self, resource: &mut Repo) -> Result<ExternalObservation> {
        let params = resource.params().clone();
        let remote = self
            .client
            .repos()
            .get(&params.organization, &params.name)
            .await?;

        let Some(remote) = remote else {
            debug!(org = %params.organization, name = %params.name, "Repo does not exist");
            resource.status.at_provider = RepoObservation::default();
            return Ok(ExternalObservation::absent());
        };

        self.record(
            resource,
            EventReason::AlreadyExists,
            format!("Repo {} already exists", params.full_name()),
        );

        if remote.private.is_some_and(|private| private != params.private) {
            debug!(
                org = %params.organization,
                name = %params.name,
                desired = params.private,
                observed = ?remote.private,
                "Repo visibility differs from spec; not corrected"
            );
        }

        resource.status.at_provider = RepoObservation {
            url: remote.html_url,
            private: remote.private,
        };
        resource.set_condition(Condition::available());

        Ok(ExternalObservation::present())
    }

    async fn create(&self, resource: &mut Repo) -> Result<ExternalCreation> {
        resource.set_condition(Condition::creating());
        let params = resource.params().clone();

        self.client.repos().create(&params).await?;

        self.record(
            resource,
            EventReason::RepoCreated,
            format!("Repo {} created", params.full_name()),
        );
        Ok(ExternalCreation)
    }

    async fn update(&self, resource: &mut Repo) -> Result<ExternalUpdate> {
        debug!(name = resource.name(), "Repo update is a no-op");
        Ok(ExternalUpdate)
    }

    async fn delete(&self, resource: &mut Repo) -> Result<()> {
        resource.set_condition(Condition::deleting());
        let params = resource.params().clone();

        self.client
            .repos()
            .delete(&params.organization, &params.name)
            .await?;

        info!(org = %params.organization, name = %params.name, "Repo deleted");
        self.record(
            resource,
            EventReason::RepoDeleted,
            format!("Repo {} deleted", params.full_name()),
        );
        Ok(())
    }
}
