#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! Managed-resource reconciliation for GitHub repositories.
//!
//! Each record is driven through the same cycle on every poll:
//!
//! 1. **Connect**: resolve the referenced provider config and its token
//!    secret into a fresh GitHub client.
//! 2. **Observe**: ask GitHub whether the repository exists.
//! 3. **Act**: create when absent, delete when the record is being deleted,
//!    otherwise nothing.
//! 4. **Record**: write `Ready`/`Synced` conditions back to the store and
//!    emit events.
//!
//! # Example
//!
//! ```ignore
//! use ghrepo_reconciler::{
//!     ConfigResolver, ControllerOptions, ManagedReconciler, ReconciliationLoop, RepoConnector,
//!     TracingRecorder,
//! };
//!
//! let recorder = Arc::new(TracingRecorder);
//! let resolver = Arc::new(ConfigResolver::new(configs, secrets, usage.clone()));
//! let connector = Arc::new(RepoConnector::new(resolver, recorder.clone()));
//! let reconciler = Arc::new(ManagedReconciler::new(store.clone(), connector, usage, recorder));
//!
//! let loop_runner = ReconciliationLoop::new(reconciler, store, ControllerOptions::default())?;
//! loop_runner.run().await?;
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod r#loop;
pub mod managed;
pub mod reconciler;
pub mod repo;
pub mod store;
pub mod types;

pub use config::ConfigResolver;
pub use error::{Error, Result};
pub use events::{
    Event, EventReason, EventRecorder, EventType, FanoutRecorder, InMemoryRecorder,
    TracingRecorder,
};
pub use r#loop::{ControllerOptions, GlobalRateLimiter, LoopStopper, ReconciliationLoop};
pub use managed::{
    ExternalClient, ExternalConnector, ExternalCreation, ExternalObservation, ExternalUpdate,
    Managed, ResourceRef,
};
pub use reconciler::ManagedReconciler;
pub use repo::{RepoConnector, RepoExternal};
pub use store::{
    InMemoryManagedStore, InMemoryProviderConfigStore, InMemorySecretStore, InMemoryUsageTracker,
    ManagedStore, ProviderConfigStore, SecretStore, UsageTracker,
};
pub use types::{CycleReport, ReconcileOutcome};
