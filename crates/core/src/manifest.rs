//! Multi-document YAML manifests holding repos, provider configs and secrets.

use itertools::Itertools;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::provider::{PROVIDER_CONFIG_KIND, ProviderConfig, SECRET_KIND, Secret};
use crate::repo::{REPO_KIND, Repo};

/// Every record declared in one manifest.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub repos: Vec<Repo>,
    pub provider_configs: Vec<ProviderConfig>,
    pub secrets: Vec<Secret>,
}

impl Manifest {
    /// Parse a `---` separated YAML stream, dispatching on each document's `kind`.
    ///
    /// # Errors
    ///
    /// Fails on malformed YAML, documents without a `kind`, unknown kinds and
    /// duplicate record names.
    pub fn from_yaml(input: &str) -> Result<Self> {
        let mut manifest = Self::default();

        for (index, document) in serde_yaml::Deserializer::from_str(input).enumerate() {
            let value = serde_yaml::Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }

            let kind = value
                .get("kind")
                .and_then(serde_yaml::Value::as_str)
                .map(str::to_owned)
                .ok_or(Error::MissingKind { index })?;

            debug!(index, kind = %kind, "Parsed manifest document");

            match kind.as_str() {
                REPO_KIND => manifest.repos.push(serde_yaml::from_value(value)?),
                PROVIDER_CONFIG_KIND => manifest
                    .provider_configs
                    .push(serde_yaml::from_value(value)?),
                SECRET_KIND => manifest.secrets.push(serde_yaml::from_value(value)?),
                other => return Err(Error::unsupported_kind(other)),
            }
        }

        manifest.check_duplicates()?;
        Ok(manifest)
    }

    fn check_duplicates(&self) -> Result<()> {
        if let Some(name) = self.repos.iter().map(Repo::name).duplicates().next() {
            return Err(Error::duplicate(REPO_KIND, name));
        }
        if let Some(name) = self
            .provider_configs
            .iter()
            .map(ProviderConfig::name)
            .duplicates()
            .next()
        {
            return Err(Error::duplicate(PROVIDER_CONFIG_KIND, name));
        }
        if let Some((namespace, name)) = self
            .secrets
            .iter()
            .map(|s| (s.namespace(), s.name()))
            .duplicates()
            .next()
        {
            return Err(Error::duplicate(SECRET_KIND, format!("{namespace}/{name}")));
        }
        Ok(())
    }

    /// Check every repo has a valid identity and references a declared config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSpec`] naming the first offending repo.
    pub fn validate(&self) -> Result<()> {
        for repo in &self.repos {
            repo.params()
                .validate()
                .map_err(|e| Error::invalid_spec(format!("repo '{}': {e}", repo.name())))?;

            if let Some(reference) = &repo.spec.provider_config_ref {
                let declared = self
                    .provider_configs
                    .iter()
                    .any(|c| c.name() == reference.name);
                if !declared {
                    return Err(Error::invalid_spec(format!(
                        "repo '{}' references undeclared provider config '{}'",
                        repo.name(),
                        reference.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.repos
            .len()
            .saturating_add(self.provider_configs.len())
            .saturating_add(self.secrets.len())
    }

    /// Whether the manifest declares nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
