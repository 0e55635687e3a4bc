//! Authenticated GitHub API client.

use std::fmt;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tracing::debug;

use crate::endpoint::ApiEndpoint;
use crate::error::{Error, GithubError, Result};
use crate::repos::Repos;
use crate::transport::HttpTransport;

/// Media type requested from the API.
pub const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

/// An API token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Blank or whitespace only.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// The `Authorization` header value, marked sensitive.
    fn header_value(&self) -> Result<HeaderValue> {
        let mut value = HeaderValue::from_str(&format!("token {}", self.0))
            .map_err(|_| Error::InvalidToken)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Everything needed to build a [`GithubClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// API URL; `None` or blank selects the public API.
    pub api_url: Option<String>,
    pub token: Token,
    pub transport: HttpTransport,
}

/// Client for the handful of GitHub endpoints the controller needs.
///
/// Built fresh for every reconciliation so that credential and URL changes
/// take effect on the next cycle.
#[derive(Debug, Clone)]
pub struct GithubClient {
    endpoint: ApiEndpoint,
    authorization: HeaderValue,
    transport: HttpTransport,
}

impl GithubClient {
    /// Build a client from `options`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidApiUrl`] if the API URL is unusable and
    /// [`Error::InvalidToken`] if the token cannot be sent as a header.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let endpoint = ApiEndpoint::parse(options.api_url.as_deref())?;
        let authorization = options.token.header_value()?;
        debug!(
            base = %endpoint.base(),
            prefix = endpoint.prefix(),
            "Created GitHub client"
        );
        Ok(Self {
            endpoint,
            authorization,
            transport: options.transport,
        })
    }

    /// Where requests are sent.
    pub const fn endpoint(&self) -> &ApiEndpoint {
        &self.endpoint
    }

    /// Repository operations.
    pub const fn repos(&self) -> Repos<'_> {
        Repos::new(self)
    }

    /// Whether `owner` is an organization rather than a user.
    ///
    /// # Errors
    ///
    /// Fails on any status other than 200 or 404, or on transport failure.
    pub async fn is_organization(&self, owner: &str) -> Result<bool> {
        let response = self.send(self.request(Method::GET, ["orgs", owner])?).await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(api_error(response).await),
        }
    }

    /// Start a request to the given path segments, with auth and accept headers.
    pub(crate) fn request<I>(&self, method: Method, segments: I) -> Result<RequestBuilder>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let url = self.endpoint.url(segments)?;
        Ok(self
            .transport
            .client()
            .request(method, url)
            .header(AUTHORIZATION, self.authorization.clone())
            .header(ACCEPT, GITHUB_MEDIA_TYPE))
    }

    pub(crate) async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder.build()?;
        let method = request.method().clone();
        let path = request.url().path().to_string();

        let response = self.transport.execute(request).await?;
        debug!(%method, path = %path, status = %response.status(), "GitHub responded");
        Ok(response)
    }
}

/// Turn an unexpected response into an error, decoding the API error body if
/// there is one.
pub(crate) async fn api_error(response: Response) -> Error {
    let status = response.status();
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => return Error::Http(e),
    };

    if body.iter().all(u8::is_ascii_whitespace) {
        return Error::UnexpectedStatus { status };
    }

    match serde_json::from_slice::<GithubError>(&body) {
        Ok(error) => Error::Api { status, error },
        Err(e) => Error::undecodable(status, e.to_string()),
    }
}
