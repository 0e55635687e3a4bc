//! Repository endpoints.
//!
//! Each call maps a set of status codes to success, confirmed absence or an
//! error. A 404 is never an error here: it means "not there".

use ghrepo_core::RepoParams;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::{GithubClient, api_error};
use crate::error::Result;

/// The fields of a remote repository the controller cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RemoteRepository {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub private: Option<bool>,
}

/// Body of a repository creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateRepository<'a> {
    pub name: &'a str,
    pub private: bool,
    pub auto_init: bool,
}

impl<'a> From<&'a RepoParams> for CreateRepository<'a> {
    fn from(params: &'a RepoParams) -> Self {
        Self {
            name: &params.name,
            private: params.private,
            auto_init: params.auto_init,
        }
    }
}

/// Repository operations, borrowed from a [`GithubClient`].
#[derive(Debug, Clone, Copy)]
pub struct Repos<'a> {
    client: &'a GithubClient,
}

impl<'a> Repos<'a> {
    pub(crate) const fn new(client: &'a GithubClient) -> Self {
        Self { client }
    }

    /// Fetch `org/name`, or `None` if it does not exist.
    ///
    /// A 200 whose body does not decode still counts as present.
    ///
    /// # Errors
    ///
    /// Fails on any status other than 200 or 404, or on transport failure.
    pub async fn get(&self, org: &str, name: &str) -> Result<Option<RemoteRepository>> {
        let request = self.client.request(Method::GET, ["repos", org, name])?;
        let response = self.client.send(request).await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.bytes().await?;
                let repository = serde_json::from_slice(&body).unwrap_or_else(|e| {
                    debug!(org, name, error = %e, "Ignoring undecodable repository body");
                    RemoteRepository::default()
                });
                Ok(Some(repository))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(api_error(response).await),
        }
    }

    /// Whether `org/name` exists.
    ///
    /// # Errors
    ///
    /// See [`Repos::get`].
    pub async fn exists(&self, org: &str, name: &str) -> Result<bool> {
        Ok(self.get(org, name).await?.is_some())
    }

    /// Create the repository described by `params`.
    ///
    /// Organization owners get `POST orgs/{org}/repos`; anything else is
    /// treated as the authenticated user and gets `POST user/repos`.
    ///
    /// # Errors
    ///
    /// Fails unless the API answers 201. API error bodies are decoded into
    /// [`crate::Error::Api`].
    pub async fn create(&self, params: &RepoParams) -> Result<()> {
        let org = params.organization.as_str();
        let is_org = self.client.is_organization(org).await?;

        let request = if is_org {
            self.client.request(Method::POST, ["orgs", org, "repos"])?
        } else {
            self.client.request(Method::POST, ["user", "repos"])?
        };
        let response = self
            .client
            .send(request.json(&CreateRepository::from(params)))
            .await?;

        if response.status() == StatusCode::CREATED {
            info!(org, name = %params.name, is_org, "Created repository");
            Ok(())
        } else {
            Err(api_error(response).await)
        }
    }

    /// Delete `org/name`. Deleting a repository that is already gone succeeds.
    ///
    /// # Errors
    ///
    /// Fails on any status other than 204 or 404, or on transport failure.
    pub async fn delete(&self, org: &str, name: &str) -> Result<()> {
        let request = self.client.request(Method::DELETE, ["repos", org, name])?;
        let response = self.client.send(request).await?;

        match response.status() {
            StatusCode::NO_CONTENT => {
                info!(org, name, "Deleted repository");
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                debug!(org, name, "Repository already absent");
                Ok(())
            }
            _ => Err(api_error(response).await),
        }
    }
}
