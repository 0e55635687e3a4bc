//! Wiring a manifest into a running controller.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ghrepo_core::{Manifest, Repo};
use ghrepo_reconciler::{
    ConfigResolver, ControllerOptions, CycleReport, EventRecorder, FanoutRecorder,
    InMemoryManagedStore, InMemoryProviderConfigStore, InMemorySecretStore, InMemoryUsageTracker,
    ManagedReconciler, ReconcileOutcome, ReconciliationLoop, RepoConnector, TracingRecorder,
};
use tracing::info;

/// Read and parse a manifest file.
///
/// # Errors
///
/// Fails if the file cannot be read or is not a valid manifest.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    let manifest = Manifest::from_yaml(&content)
        .with_context(|| format!("Failed to parse manifest {}", path.display()))?;
    manifest
        .validate()
        .with_context(|| format!("Invalid manifest {}", path.display()))?;
    Ok(manifest)
}

/// The in-memory stores and reconciler for one manifest.
pub struct Controller {
    store: Arc<InMemoryManagedStore<Repo>>,
    reconciler: Arc<ManagedReconciler<Repo>>,
}

impl Controller {
    /// Wire `manifest` into stores, a Repo connector and a reconciler.
    ///
    /// Events go to the log and to `recorder` when one is given.
    pub fn new(manifest: Manifest, recorder: Option<Arc<dyn EventRecorder>>) -> Self {
        let Manifest {
            repos,
            provider_configs,
            secrets,
        } = manifest;

        let recorder: Arc<dyn EventRecorder> = Arc::new(
            recorder
                .into_iter()
                .fold(FanoutRecorder::new().with(Arc::new(TracingRecorder)), |fan, sink| {
                    fan.with(sink)
                }),
        );

        let usage = Arc::new(InMemoryUsageTracker::new());
        let configs = Arc::new(InMemoryProviderConfigStore::new(
            provider_configs,
            usage.clone(),
        ));
        let secrets = Arc::new(InMemorySecretStore::new(secrets));
        let resolver = Arc::new(ConfigResolver::new(configs, secrets, usage.clone()));
        let connector = Arc::new(RepoConnector::new(resolver, recorder.clone()));

        let store = Arc::new(InMemoryManagedStore::new(repos));
        let reconciler = Arc::new(ManagedReconciler::new(
            store.clone(),
            connector,
            usage,
            recorder,
        ));

        Self { store, reconciler }
    }

    /// The repo records, with status as last reconciled.
    pub fn store(&self) -> &Arc<InMemoryManagedStore<Repo>> {
        &self.store
    }

    /// A loop over every repo in the store.
    ///
    /// # Errors
    ///
    /// Fails if `options` do not validate.
    pub fn reconciliation_loop(
        &self,
        options: ControllerOptions,
    ) -> Result<ReconciliationLoop<Repo>> {
        let store = Arc::clone(&self.store);
        ReconciliationLoop::new(Arc::clone(&self.reconciler), store, options)
            .context("Failed to build reconciliation loop")
    }

    /// Run a single cycle over every repo.
    ///
    /// # Errors
    ///
    /// Fails if the loop cannot be built or the records cannot be listed.
    pub async fn run_once(&self, options: ControllerOptions) -> Result<CycleReport> {
        let report = self.reconciliation_loop(options)?.reconcile_once().await?;
        info!(%report, "Cycle complete");
        Ok(report)
    }

    /// Mark the named repo for deletion and reconcile it.
    ///
    /// # Errors
    ///
    /// Fails if there is no such repo or the deletion fails.
    pub async fn delete(&self, name: &str) -> Result<ReconcileOutcome> {
        self.store
            .modify(name, Repo::mark_for_deletion)
            .await
            .with_context(|| format!("No repo named '{name}' in the manifest"))?;
        self.reconciler
            .reconcile(name)
            .await
            .with_context(|| format!("Failed to delete repo '{name}'"))
    }
}

/// One-line description of what a manifest declares.
pub fn summarize(manifest: &Manifest) -> String {
    format!(
        "{} repos, {} provider configs, {} secrets",
        manifest.repos.len(),
        manifest.provider_configs.len(),
        manifest.secrets.len()
    )
}
