//! API endpoint and request URL composition.
//!
//! A configured API URL is split into a scheme+host base and a path prefix,
//! e.g. `https://ghe.example.com/api/v3` becomes base `https://ghe.example.com/`
//! and prefix `/api/v3`. Request paths are appended segment by segment, so the
//! prefix is never dropped or duplicated and segments cannot smuggle in
//! separators.

use url::Url;

use crate::error::{Error, Result};

/// The public GitHub API.
pub const DEFAULT_API_URL: &str = "https://api.github.com/";

/// Where API requests are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoint {
    base: Url,
    prefix: String,
}

impl ApiEndpoint {
    /// Parse an API URL; `None` or a blank string selects [`DEFAULT_API_URL`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidApiUrl`] if the URL does not parse or cannot
    /// carry a path (e.g. `mailto:`).
    pub fn parse(api_url: Option<&str>) -> Result<Self> {
        let raw = api_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_API_URL);

        let mut base = Url::parse(raw).map_err(|e| Error::invalid_api_url(raw, e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(Error::invalid_api_url(raw, "URL cannot carry a path"));
        }

        let segments: Vec<&str> = base
            .path()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        let prefix = if segments.is_empty() {
            String::new()
        } else {
            format!("/{}", segments.join("/"))
        };

        base.set_path("/");
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self { base, prefix })
    }

    /// Scheme, host and port, with path `/`.
    pub const fn base(&self) -> &Url {
        &self.base
    }

    /// Path prefix such as `/api/v3`, empty when the API is at the root.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full URL for a request path given as unencoded segments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidApiUrl`] if the base cannot carry a path.
    pub fn url<I>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.base.clone();
        url.set_path(&self.prefix);
        url.path_segments_mut()
            .map_err(|()| Error::invalid_api_url(self.base.as_str(), "URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}
