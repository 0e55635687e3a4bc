//! Provider configuration and secret records.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;

/// API version written on `ProviderConfig` records.
pub const PROVIDER_CONFIG_API_VERSION: &str = "ghrepo.io/v1alpha1";

/// Kind name of `ProviderConfig` records.
pub const PROVIDER_CONFIG_KIND: &str = "ProviderConfig";

/// Kind name of `Secret` records.
pub const SECRET_KIND: &str = "Secret";

/// Where provider credentials come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CredentialsSource {
    #[default]
    None,
    Secret,
    Environment,
    Filesystem,
}

impl fmt::Display for CredentialsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Secret => write!(f, "Secret"),
            Self::Environment => write!(f, "Environment"),
            Self::Filesystem => write!(f, "Filesystem"),
        }
    }
}

/// Selects one key of a namespaced secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretKeySelector {
    pub namespace: String,
    pub name: String,
    pub key: String,
}

impl SecretKeySelector {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for SecretKeySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}[{}]", self.namespace, self.name, self.key)
    }
}

/// Credentials used to authenticate against the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentials {
    #[serde(default)]
    pub source: CredentialsSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretKeySelector>,
}

/// Desired provider configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigSpec {
    /// API URL; empty or missing means the public GitHub API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    pub credentials: ProviderCredentials,

    /// Mirror every request and response to stderr.
    ///
    /// This prints the `Authorization` header, so it leaks the token into
    /// whatever collects stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
}

/// Connection settings shared by the repos that reference it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default = "provider_config_api_version")]
    pub api_version: String,
    #[serde(default = "provider_config_kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ProviderConfigSpec,
}

fn provider_config_api_version() -> String {
    PROVIDER_CONFIG_API_VERSION.to_string()
}

fn provider_config_kind() -> String {
    PROVIDER_CONFIG_KIND.to_string()
}

impl ProviderConfig {
    /// A provider config reading its token from `secret_ref`.
    pub fn with_secret(name: impl Into<String>, secret_ref: SecretKeySelector) -> Self {
        Self {
            api_version: provider_config_api_version(),
            kind: provider_config_kind(),
            metadata: ObjectMeta::named(name),
            spec: ProviderConfigSpec {
                api_url: None,
                credentials: ProviderCredentials {
                    source: CredentialsSource::Secret,
                    secret_ref: Some(secret_ref),
                },
                verbose: None,
            },
        }
    }

    /// Point the config at a custom API URL.
    #[must_use]
    pub fn api_url(mut self, api_url: impl Into<String>) -> Self {
        self.spec.api_url = Some(api_url.into());
        self
    }

    /// Enable or disable wire tracing.
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.spec.verbose = Some(verbose);
        self
    }

    /// Record name.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// The API URL if one is set and non-empty.
    pub fn api_url_override(&self) -> Option<&str> {
        self.spec
            .api_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Whether wire tracing was explicitly enabled.
    pub fn is_verbose(&self) -> bool {
        self.spec.verbose == Some(true)
    }
}

/// Where a secret value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource<'a> {
    /// The value is stored in the record.
    Literal(&'a str),
    /// The value is read from this environment variable at fetch time.
    Env(&'a str),
}

/// A namespaced bag of secret values.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    #[serde(default = "secret_api_version")]
    pub api_version: String,
    #[serde(default = "secret_kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub string_data: BTreeMap<String, String>,
    #[serde(default)]
    pub from_env: BTreeMap<String, String>,
}

fn secret_api_version() -> String {
    "v1".to_string()
}

fn secret_kind() -> String {
    SECRET_KIND.to_string()
}

impl Secret {
    /// An empty secret.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            api_version: secret_api_version(),
            kind: secret_kind(),
            metadata: ObjectMeta::namespaced(namespace, name),
            string_data: BTreeMap::new(),
            from_env: BTreeMap::new(),
        }
    }

    /// Store a literal value under `key`.
    #[must_use]
    pub fn literal(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.string_data.insert(key.into(), value.into());
        self
    }

    /// Resolve `key` from environment variable `var` at fetch time.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, var: impl Into<String>) -> Self {
        self.from_env.insert(key.into(), var.into());
        self
    }

    /// Namespace, defaulted.
    pub fn namespace(&self) -> &str {
        self.metadata.namespace_or_default()
    }

    /// Record name.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Where the value for `key` comes from. Literal values win.
    pub fn source(&self, key: &str) -> Option<SecretSource<'_>> {
        self.string_data
            .get(key)
            .map(|v| SecretSource::Literal(v.as_str()))
            .or_else(|| {
                self.from_env
                    .get(key)
                    .map(|v| SecretSource::Env(v.as_str()))
            })
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("namespace", &self.namespace())
            .field("name", &self.metadata.name)
            .field("keys", &self.string_data.keys().collect::<Vec<_>>())
            .field("from_env", &self.from_env)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_config_from_yaml() -> Result<(), serde_yaml::Error> {
        let yaml = r"
metadata:
  name: default
spec:
  apiUrl: https://ghe.example.com/api/v3
  credentials:
    source: Secret
    secretRef:
      namespace: ghrepo-system
      name: github-token
      key: token
  verbose: true
";
        let config: ProviderConfig = serde_yaml::from_str(yaml)?;
        assert_eq!(config.kind, PROVIDER_CONFIG_KIND);
        assert_eq!(config.spec.credentials.source, CredentialsSource::Secret);
        assert_eq!(
            config.api_url_override(),
            Some("https://ghe.example.com/api/v3")
        );
        assert!(config.is_verbose());
        Ok(())
    }

    #[test]
    fn test_blank_api_url_means_default() {
        let config = ProviderConfig::with_secret(
            "default",
            SecretKeySelector::new("default", "gh", "token"),
        )
        .api_url("   ");
        assert_eq!(config.api_url_override(), None);
        assert!(!config.is_verbose());
    }

    #[test]
    fn test_secret_source_prefers_literal() {
        let secret = Secret::new("default", "gh")
            .literal("token", "abc")
            .env("token", "GITHUB_TOKEN")
            .env("other", "OTHER_TOKEN");

        assert_eq!(secret.source("token"), Some(SecretSource::Literal("abc")));
        assert_eq!(secret.source("other"), Some(SecretSource::Env("OTHER_TOKEN")));
        assert_eq!(secret.source("missing"), None);
    }

    #[test]
    fn test_secret_debug_hides_values() {
        let secret = Secret::new("default", "gh").literal("token", "super-secret");
        let debug = format!("{secret:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("token"));
    }
}
