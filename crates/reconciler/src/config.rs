//! Provider config resolution.
//!
//! Turns a managed record's provider reference into [`ClientOptions`]: API
//! URL, token and a configured transport. Nothing is cached; every call reads
//! the config and the secret again so rotated credentials apply on the next
//! reconciliation.

use std::sync::Arc;

use ghrepo_core::CredentialsSource;
use ghrepo_github::{ClientOptions, HttpTransport, Token, TransportConfig};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::managed::Managed;
use crate::store::{ProviderConfigStore, SecretStore, UsageTracker};

/// Resolves provider configs into client options.
pub struct ConfigResolver {
    configs: Arc<dyn ProviderConfigStore>,
    secrets: Arc<dyn SecretStore>,
    usage: Arc<dyn UsageTracker>,
    transport: TransportConfig,
}

impl ConfigResolver {
    /// Create a resolver with the default transport limits.
    pub fn new(
        configs: Arc<dyn ProviderConfigStore>,
        secrets: Arc<dyn SecretStore>,
        usage: Arc<dyn UsageTracker>,
    ) -> Self {
        Self {
            configs,
            secrets,
            usage,
            transport: TransportConfig::default(),
        }
    }

    /// Use `transport` as the base transport config. The provider config's
    /// `verbose` flag is applied on top.
    #[must_use]
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Resolve the provider config `resource` references.
    ///
    /// Fails before any HTTP traffic when the reference, the config, the
    /// credentials source or the secret is unusable.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingProviderConfigRef`] when no config is referenced.
    /// - [`Error::GetProviderConfig`] when the config cannot be fetched.
    /// - [`Error::TrackUsage`] when usage cannot be recorded.
    /// - [`Error::UnsupportedCredentialsSource`] for any source but `Secret`.
    /// - [`Error::NoSecretRef`] when no secret is referenced.
    /// - [`Error::SecretFetch`] when the secret cannot be read or is blank.
    pub async fn resolve<M: Managed>(&self, resource: &M) -> Result<ClientOptions> {
        let name = resource
            .provider_config_ref()
            .ok_or(Error::MissingProviderConfigRef)?;

        let config = self
            .configs
            .get(name)
            .await
            .map_err(|e| Error::get_provider_config(name, e.to_string()))?;

        self.usage
            .track(name, &resource.resource_ref())
            .await
            .map_err(|e| Error::track_usage(e.to_string()))?;

        let credentials = &config.spec.credentials;
        if credentials.source != CredentialsSource::Secret {
            return Err(Error::UnsupportedCredentialsSource {
                kind: credentials.source,
            });
        }
        let selector = credentials.secret_ref.as_ref().ok_or(Error::NoSecretRef)?;

        let token = self
            .secrets
            .value(selector)
            .await
            .map_err(|e| Error::secret_fetch(selector.to_string(), e.to_string()))?;
        let token = Token::new(token.trim());
        if token.is_empty() {
            return Err(Error::secret_fetch(selector.to_string(), "secret value is empty"));
        }

        if config.is_verbose() {
            warn!(
                provider_config = name,
                "Verbose tracing enabled: request headers, including the token, go to stderr"
            );
        }
        let transport = HttpTransport::new(&self.transport.clone().verbose(config.is_verbose()))?;

        debug!(
            provider_config = name,
            api_url = config.api_url_override().unwrap_or("default"),
            "Resolved provider config"
        );

        Ok(ClientOptions {
            api_url: config.api_url_override().map(str::to_owned),
            token,
            transport,
        })
    }
}
