//! Host-side reconciliation of one managed record.

use std::sync::Arc;

use ghrepo_core::Condition;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::events::{Event, EventReason, EventRecorder};
use crate::managed::{ExternalConnector, Managed};
use crate::store::{ManagedStore, UsageTracker};
use crate::types::ReconcileOutcome;

/// Drives a record through connect, observe and the resulting action, then
/// writes status back to the store.
///
/// Errors from the external client are returned as-is after being recorded
/// as a `Synced=False` condition and a warning event. Retrying is left to the
/// caller's schedule.
pub struct ManagedReconciler<M: Managed> {
    store: Arc<dyn ManagedStore<M>>,
    connector: Arc<dyn ExternalConnector<M>>,
    usage: Arc<dyn UsageTracker>,
    recorder: Arc<dyn EventRecorder>,
}

impl<M: Managed> ManagedReconciler<M> {
    pub fn new(
        store: Arc<dyn ManagedStore<M>>,
        connector: Arc<dyn ExternalConnector<M>>,
        usage: Arc<dyn UsageTracker>,
        recorder: Arc<dyn EventRecorder>,
    ) -> Self {
        Self {
            store,
            connector,
            usage,
            recorder,
        }
    }

    /// Reconcile the record named `name`.
    ///
    /// # Errors
    ///
    /// Returns the first error from connecting, observing, creating,
    /// updating or deleting, or from the store.
    pub async fn reconcile(&self, name: &str) -> Result<ReconcileOutcome> {
        let mut resource = match self.store.get(name).await {
            Ok(resource) => resource,
            Err(e) if e.is_not_found() => {
                debug!(controller = M::KIND, name, "Record is gone");
                return Ok(ReconcileOutcome::Missing);
            }
            Err(e) => return Err(e),
        };

        match self.drive(&mut resource).await {
            Ok(ReconcileOutcome::Deleted) => {
                self.usage.release(&resource.resource_ref()).await?;
                self.store.remove(name).await?;
                info!(controller = M::KIND, name, "Record removed after delete");
                Ok(ReconcileOutcome::Deleted)
            }
            Ok(outcome) => {
                resource.set_condition(Condition::reconcile_success());
                self.store.update(resource).await?;
                debug!(controller = M::KIND, name, %outcome, "Reconciled");
                Ok(outcome)
            }
            Err((reason, err)) => {
                warn!(controller = M::KIND, name, error = %err, "Reconcile failed");
                self.recorder.record(Event::warning(
                    resource.resource_ref(),
                    reason,
                    err.to_string(),
                ));
                resource.set_condition(Condition::reconcile_error(err.to_string()));
                if let Err(store_err) = self.store.update(resource).await {
                    warn!(controller = M::KIND, name, error = %store_err, "Cannot record status");
                }
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        resource: &mut M,
    ) -> std::result::Result<ReconcileOutcome, (EventReason, Error)> {
        let external = self
            .connector
            .connect(resource)
            .await
            .map_err(|e| (EventReason::CannotConnect, e))?;

        let observation = external
            .observe(resource)
            .await
            .map_err(|e| (EventReason::CannotObserve, e))?;

        if resource.is_deletion_requested() {
            if observation.resource_exists {
                external
                    .delete(resource)
                    .await
                    .map_err(|e| (EventReason::CannotDelete, e))?;
            }
            return Ok(ReconcileOutcome::Deleted);
        }

        if !observation.resource_exists {
            external
                .create(resource)
                .await
                .map_err(|e| (EventReason::CannotCreate, e))?;
            return Ok(ReconcileOutcome::Created);
        }

        if !observation.resource_up_to_date {
            external
                .update(resource)
                .await
                .map_err(|e| (EventReason::CannotUpdate, e))?;
            return Ok(ReconcileOutcome::Updated);
        }

        Ok(ReconcileOutcome::UpToDate)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A scriptable external system for host tests.

    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use ghrepo_core::Repo;

    use crate::error::{Error, Result};
    use crate::managed::{
        ExternalClient, ExternalConnector, ExternalCreation, ExternalObservation, ExternalUpdate,
    };

    /// Remote repositories keyed by full name, with call counters.
    #[derive(Default)]
    pub struct FakeGithub {
        pub repos: Mutex<BTreeSet<String>>,
        pub creates: AtomicUsize,
        pub deletes: AtomicUsize,
        pub fail_observe: bool,
    }

    impl FakeGithub {
        pub fn with_repos<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
            Self {
                repos: Mutex::new(names.into_iter().map(str::to_string).collect()),
                ..Self::default()
            }
        }

        pub fn contains(&self, full_name: &str) -> bool {
            self.repos
                .lock()
                .map(|repos| repos.contains(full_name))
                .unwrap_or(false)
        }

        pub fn creates(&self) -> usize {
            self.creates.load(Ordering::SeqCst)
        }

        pub fn deletes(&self) -> usize {
            self.deletes.load(Ordering::SeqCst)
        }
    }

    pub struct FakeConnector(pub Arc<FakeGithub>);

    #[async_trait]
    impl ExternalConnector<Repo> for FakeConnector {
        async fn connect(&self, _resource: &Repo) -> Result<Box<dyn ExternalClient<Repo>>> {
            Ok(Box::new(FakeSession(Arc::clone(&self.0))))
        }
    }

    struct FakeSession(Arc<FakeGithub>);

    #[async_trait]
    impl ExternalClient<Repo> for FakeSession {
        async fn observe(&self, resource: &mut Repo) -> Result<ExternalObservation> {
            if self.0.fail_observe {
                return Err(Error::invalid_config("observe failed"));
            }
            Ok(if self.0.contains(&resource.params().full_name()) {
                ExternalObservation::present()
            } else {
                ExternalObservation::absent()
            })
        }

        async fn create(&self, resource: &mut Repo) -> Result<ExternalCreation> {
            self.0.creates.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut repos) = self.0.repos.lock() {
                repos.insert(resource.params().full_name());
            }
            Ok(ExternalCreation)
        }

        async fn update(&self, _resource: &mut Repo) -> Result<ExternalUpdate> {
            Ok(ExternalUpdate)
        }

        async fn delete(&self, resource: &mut Repo) -> Result<()> {
            self.0.deletes.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut repos) = self.0.repos.lock() {
                repos.remove(&resource.params().full_name());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeConnector, FakeGithub};
    use super::*;
    use crate::events::InMemoryRecorder;
    use crate::managed::ResourceRef;
    use crate::store::{InMemoryManagedStore, InMemoryUsageTracker};
    use ghrepo_core::{ConditionReason, ConditionStatus, ConditionType, Repo, RepoParams};

    struct Host {
        reconciler: ManagedReconciler<Repo>,
        store: Arc<InMemoryManagedStore<Repo>>,
        github: Arc<FakeGithub>,
        usage: Arc<InMemoryUsageTracker>,
        recorder: Arc<InMemoryRecorder>,
    }

    fn host(github: FakeGithub, repos: Vec<Repo>) -> Host {
        let store = Arc::new(InMemoryManagedStore::new(repos));
        let github = Arc::new(github);
        let usage = Arc::new(InMemoryUsageTracker::new());
        let recorder = Arc::new(InMemoryRecorder::new());
        let reconciler = ManagedReconciler::new(
            store.clone(),
            Arc::new(FakeConnector(github.clone())),
            usage.clone(),
            recorder.clone(),
        );
        Host {
            reconciler,
            store,
            github,
            usage,
            recorder,
        }
    }

    fn widgets() -> Repo {
        Repo::new("widgets", RepoParams::new("acme", "widgets")).with_provider_config("default")
    }

    // ===== Behavior-Driven Tests =====

    /// Given a repo that is absent remotely
    /// When it is reconciled
    /// Then it is created and marked synced
    #[tokio::test]
    async fn absent_repo_is_created() -> Result<()> {
        let host = host(FakeGithub::default(), vec![widgets()]);

        let outcome = host.reconciler.reconcile("widgets").await?;

        assert_eq!(outcome, ReconcileOutcome::Created);
        assert!(host.github.contains("acme/widgets"));
        let stored = host.store.get("widgets").await?;
        assert_eq!(
            stored
                .status
                .conditions
                .get(ConditionType::Synced)
                .map(|c| c.reason),
            Some(ConditionReason::ReconcileSuccess)
        );
        Ok(())
    }

    /// Given a repo that already exists remotely
    /// When it is reconciled repeatedly
    /// Then create is never invoked
    #[tokio::test]
    async fn existing_repo_is_never_created() -> Result<()> {
        let host = host(FakeGithub::with_repos(["acme/widgets"]), vec![widgets()]);

        for _ in 0..3 {
            let outcome = host.reconciler.reconcile("widgets").await?;
            assert_eq!(outcome, ReconcileOutcome::UpToDate);
        }

        assert_eq!(host.github.creates(), 0);
        Ok(())
    }

    /// Given a repo marked for deletion that exists remotely
    /// When it is reconciled
    /// Then the remote repo is deleted, usage released and the record removed
    #[tokio::test]
    async fn deletion_removes_remote_and_record() -> Result<()> {
        let mut repo = widgets();
        repo.mark_for_deletion();
        let host = host(FakeGithub::with_repos(["acme/widgets"]), vec![repo]);
        let user = ResourceRef::new("Repo", "widgets");
        host.usage.track("default", &user).await?;

        let outcome = host.reconciler.reconcile("widgets").await?;

        assert_eq!(outcome, ReconcileOutcome::Deleted);
        assert!(!host.github.contains("acme/widgets"));
        assert!(host.store.is_empty().await);
        assert!(host.usage.users("default").await.is_empty());
        Ok(())
    }

    /// Given a repo marked for deletion that is already gone remotely
    /// When it is reconciled
    /// Then no delete call is made and the record is still removed
    #[tokio::test]
    async fn deletion_of_absent_repo_skips_delete() -> Result<()> {
        let mut repo = widgets();
        repo.mark_for_deletion();
        let host = host(FakeGithub::default(), vec![repo]);

        let outcome = host.reconciler.reconcile("widgets").await?;

        assert_eq!(outcome, ReconcileOutcome::Deleted);
        assert_eq!(host.github.deletes(), 0);
        assert!(host.store.is_empty().await);
        Ok(())
    }

    /// Given an external system that fails to observe
    /// When a repo is reconciled
    /// Then the error is returned, recorded as Synced=False and as a warning event
    #[tokio::test]
    async fn failures_are_recorded_and_returned() -> Result<()> {
        let github = FakeGithub {
            fail_observe: true,
            ..FakeGithub::default()
        };
        let host = host(github, vec![widgets()]);

        let result = host.reconciler.reconcile("widgets").await;

        assert!(result.is_err());
        let stored = host.store.get("widgets").await?;
        let synced = stored.status.conditions.get(ConditionType::Synced);
        assert_eq!(synced.map(|c| c.status), Some(ConditionStatus::False));
        assert!(
            synced
                .and_then(|c| c.message.as_deref())
                .is_some_and(|m| m.contains("observe failed"))
        );
        assert_eq!(host.recorder.with_reason(EventReason::CannotObserve).len(), 1);
        assert_eq!(host.github.creates(), 0);
        Ok(())
    }

    /// Given a record that no longer exists
    /// When it is reconciled
    /// Then the outcome is Missing and nothing fails
    #[tokio::test]
    async fn missing_record_is_not_an_error() -> Result<()> {
        let host = host(FakeGithub::default(), vec![]);
        let outcome = host.reconciler.reconcile("ghost").await?;
        assert_eq!(outcome, ReconcileOutcome::Missing);
        Ok(())
    }
}
