//! Record storage seams and their in-memory implementations.
//!
//! The host reads desired state and provider configuration through these
//! traits, so a real deployment can back them with an API server while tests
//! and the CLI use the in-memory versions.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use ghrepo_core::{
    PROVIDER_CONFIG_KIND, ProviderConfig, SECRET_KIND, Secret, SecretKeySelector, SecretSource,
};
use itertools::Itertools;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::managed::{Managed, ResourceRef};

/// Desired-state records of one managed kind.
#[async_trait]
pub trait ManagedStore<M: Managed>: Send + Sync {
    /// Every record, ordered by name.
    async fn list(&self) -> Result<Vec<M>>;

    /// The record named `name`.
    async fn get(&self, name: &str) -> Result<M>;

    /// Replace the stored record with `resource`.
    async fn update(&self, resource: M) -> Result<()>;

    /// Forget the record named `name`.
    async fn remove(&self, name: &str) -> Result<()>;
}

/// Read access to provider configs.
#[async_trait]
pub trait ProviderConfigStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<ProviderConfig>;
}

/// Read access to secret values.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// The value selected by `selector`, read at call time.
    async fn value(&self, selector: &SecretKeySelector) -> Result<String>;
}

/// Records which managed resources use which provider config.
#[async_trait]
pub trait UsageTracker: Send + Sync {
    /// Record that `user` uses `config`. Calling it again is a no-op.
    async fn track(&self, config: &str, user: &ResourceRef) -> Result<()>;

    /// Forget every use by `user`.
    async fn release(&self, user: &ResourceRef) -> Result<()>;

    /// Current users of `config`.
    async fn users(&self, config: &str) -> Vec<ResourceRef>;
}

/// In-memory [`ManagedStore`].
pub struct InMemoryManagedStore<M> {
    records: RwLock<BTreeMap<String, M>>,
}

impl<M: Managed> InMemoryManagedStore<M> {
    /// Create a store holding `records`.
    pub fn new(records: impl IntoIterator<Item = M>) -> Self {
        Self {
            records: RwLock::new(
                records
                    .into_iter()
                    .map(|record| (record.name().to_string(), record))
                    .collect(),
            ),
        }
    }

    /// Add or replace a record.
    pub async fn insert(&self, record: M) {
        self.records
            .write()
            .await
            .insert(record.name().to_string(), record);
    }

    /// Modify the named record in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if there is no such record.
    pub async fn modify<F>(&self, name: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut M),
    {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(name)
            .ok_or_else(|| Error::not_found(M::KIND, name))?;
        f(record);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl<M: Managed> ManagedStore<M> for InMemoryManagedStore<M> {
    async fn list(&self) -> Result<Vec<M>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn get(&self, name: &str) -> Result<M> {
        self.records
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(M::KIND, name))
    }

    async fn update(&self, resource: M) -> Result<()> {
        let mut records = self.records.write().await;
        let slot = records
            .get_mut(resource.name())
            .ok_or_else(|| Error::not_found(M::KIND, resource.name()))?;
        *slot = resource;
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.records
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(M::KIND, name))
    }
}

/// In-memory [`UsageTracker`].
#[derive(Default)]
pub struct InMemoryUsageTracker {
    usages: RwLock<BTreeMap<String, BTreeSet<ResourceRef>>>,
}

impl InMemoryUsageTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageTracker for InMemoryUsageTracker {
    async fn track(&self, config: &str, user: &ResourceRef) -> Result<()> {
        let mut usages = self.usages.write().await;
        if usages
            .entry(config.to_string())
            .or_default()
            .insert(user.clone())
        {
            debug!(config, user = %user, "Tracking provider config usage");
        }
        Ok(())
    }

    async fn release(&self, user: &ResourceRef) -> Result<()> {
        let mut usages = self.usages.write().await;
        for users in usages.values_mut() {
            users.remove(user);
        }
        usages.retain(|_, users| !users.is_empty());
        Ok(())
    }

    async fn users(&self, config: &str) -> Vec<ResourceRef> {
        self.usages
            .read()
            .await
            .get(config)
            .map(|users| users.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// In-memory [`ProviderConfigStore`] that refuses to delete configs in use.
pub struct InMemoryProviderConfigStore {
    configs: RwLock<BTreeMap<String, ProviderConfig>>,
    usage: Arc<dyn UsageTracker>,
}

impl InMemoryProviderConfigStore {
    /// Create a store holding `configs`, checking deletions against `usage`.
    pub fn new(
        configs: impl IntoIterator<Item = ProviderConfig>,
        usage: Arc<dyn UsageTracker>,
    ) -> Self {
        Self {
            configs: RwLock::new(
                configs
                    .into_iter()
                    .map(|config| (config.name().to_string(), config))
                    .collect(),
            ),
            usage,
        }
    }

    /// Add or replace a config.
    pub async fn insert(&self, config: ProviderConfig) {
        self.configs
            .write()
            .await
            .insert(config.name().to_string(), config);
    }

    /// Delete a config nobody uses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigInUse`] while managed resources still use the
    /// config, or [`Error::NotFound`] if there is no such config.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let users = self.usage.users(name).await;
        if !users.is_empty() {
            return Err(Error::ConfigInUse {
                name: name.to_string(),
                users: users.iter().join(", "),
            });
        }

        self.configs
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(PROVIDER_CONFIG_KIND, name))
    }
}

#[async_trait]
impl ProviderConfigStore for InMemoryProviderConfigStore {
    async fn get(&self, name: &str) -> Result<ProviderConfig> {
        self.configs
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(PROVIDER_CONFIG_KIND, name))
    }
}

/// In-memory [`SecretStore`].
///
/// Keys backed by `fromEnv` are read from the process environment on every
/// call, so rotating the variable takes effect on the next reconciliation.
#[derive(Default)]
pub struct InMemorySecretStore {
    secrets: RwLock<BTreeMap<(String, String), Secret>>,
}

impl InMemorySecretStore {
    pub fn new(secrets: impl IntoIterator<Item = Secret>) -> Self {
        Self {
            secrets: RwLock::new(
                secrets
                    .into_iter()
                    .map(|secret| {
                        (
                            (secret.namespace().to_string(), secret.name().to_string()),
                            secret,
                        )
                    })
                    .collect(),
            ),
        }
    }

    /// Add or replace a secret.
    pub async fn insert(&self, secret: Secret) {
        self.secrets.write().await.insert(
            (secret.namespace().to_string(), secret.name().to_string()),
            secret,
        );
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn value(&self, selector: &SecretKeySelector) -> Result<String> {
        let secrets = self.secrets.read().await;
        let secret = secrets
            .get(&(selector.namespace.clone(), selector.name.clone()))
            .ok_or_else(|| {
                Error::not_found(
                    SECRET_KIND,
                    format!("{}/{}", selector.namespace, selector.name),
                )
            })?;

        match secret.source(&selector.key) {
            Some(SecretSource::Literal(value)) => Ok(value.to_string()),
            Some(SecretSource::Env(var)) => std::env::var(var).map_err(|e| {
                Error::invalid_config(format!("environment variable {var}: {e}"))
            }),
            None => Err(Error::not_found("secret key", selector.key.clone())),
        }
    }
}
