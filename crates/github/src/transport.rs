//! HTTP transport: a pooled `reqwest` client behind a middleware chain.
//!
//! Every request passes through the configured [`Middleware`] in order and
//! ends in the HTTP call itself, which is bounded by the response-header
//! timeout. The client-level timeout bounds the whole exchange.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Request, Response};
use tracing::debug;

use crate::error::{Error, Result};
use crate::trace::VerboseTracer;

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("ghrepo/", env!("CARGO_PKG_VERSION"));

/// Limits applied to the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Idle connections kept per host.
    pub max_idle_per_host: usize,

    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,

    /// Time allowed between sending a request and receiving response headers.
    pub response_header_timeout: Duration,

    /// Mirror every request and response to stderr.
    ///
    /// Leaks the `Authorization` header; see [`VerboseTracer`].
    pub verbose: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 5,
            connect_timeout: Duration::from_secs(15),
            response_header_timeout: Duration::from_secs(30),
            verbose: false,
        }
    }
}

impl TransportConfig {
    /// Enable or disable wire tracing.
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the response-header timeout.
    #[must_use]
    pub const fn response_header_timeout(mut self, timeout: Duration) -> Self {
        self.response_header_timeout = timeout;
        self
    }

    /// Overall request timeout: connect plus response-header.
    pub fn total_timeout(&self) -> Duration {
        self.connect_timeout
            .saturating_add(self.response_header_timeout)
    }
}

/// A step in the request pipeline.
///
/// Implementations may inspect or replace the request before calling
/// [`Next::run`], and inspect or replace the response it returns.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Handle `request`, delegating to the rest of the chain through `next`.
    async fn handle(&self, request: Request, next: Next<'_>) -> Result<Response>;
}

/// The remainder of a middleware chain.
pub struct Next<'a> {
    client: &'a Client,
    chain: &'a [Arc<dyn Middleware>],
    response_header_timeout: Duration,
}

impl Next<'_> {
    /// Run the remaining middleware, then send the request.
    ///
    /// # Errors
    ///
    /// Returns whatever the middleware returns, [`Error::Http`] on transport
    /// failure, or [`Error::Timeout`] when no headers arrive in time.
    pub async fn run(mut self, request: Request) -> Result<Response> {
        if let Some((current, rest)) = self.chain.split_first() {
            self.chain = rest;
            current.handle(request, self).await
        } else {
            send(self.client, request, self.response_header_timeout).await
        }
    }
}

async fn send(client: &Client, request: Request, timeout: Duration) -> Result<Response> {
    debug!(method = %request.method(), url = %request.url(), "Sending request");

    // `execute` resolves once the status line and headers are in.
    match tokio::time::timeout(timeout, client.execute(request)).await {
        Ok(response) => Ok(response?),
        Err(_) => Err(Error::timeout(
            u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        )),
    }
}

/// A configured HTTP client and its middleware chain.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    chain: Vec<Arc<dyn Middleware>>,
    response_header_timeout: Duration,
}

impl HttpTransport {
    /// Build a transport from `config`, adding a stderr [`VerboseTracer`]
    /// when `config.verbose` is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the underlying client cannot be built.
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout())
            .build()?;

        let transport = Self {
            client,
            chain: Vec::new(),
            response_header_timeout: config.response_header_timeout,
        };

        Ok(if config.verbose {
            transport.with(VerboseTracer::stderr())
        } else {
            transport
        })
    }

    /// Append `middleware` to the end of the chain.
    #[must_use]
    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.chain.push(Arc::new(middleware));
        self
    }

    /// The underlying client, for building requests.
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Number of middleware in the chain.
    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    /// Send `request` through the chain.
    ///
    /// # Errors
    ///
    /// See [`Next::run`].
    pub async fn execute(&self, request: Request) -> Result<Response> {
        Next {
            client: &self.client,
            chain: &self.chain,
            response_header_timeout: self.response_header_timeout,
        }
        .run(request)
        .await
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("middleware", &self.chain.len())
            .field("response_header_timeout", &self.response_header_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    struct Tag(&'static str);

    #[async_trait]
    impl Middleware for Tag {
        async fn handle(&self, mut request: Request, next: Next<'_>) -> Result<Response> {
            let value = match request.headers().get("x-chain") {
                Some(existing) => format!("{},{}", existing.to_str().unwrap_or(""), self.0),
                None => self.0.to_string(),
            };
            if let Ok(value) = value.parse() {
                request.headers_mut().insert("x-chain", value);
            }
            next.run(request).await
        }
    }

    struct Counter(Arc<AtomicUsize>);

    #[async_trait]
    impl Middleware for Counter {
        async fn handle(&self, request: Request, next: Next<'_>) -> Result<Response> {
            let response = next.run(request).await?;
            if response.status().is_success() {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
            Ok(response)
        }
    }

    #[test]
    fn test_default_limits() {
        let config = TransportConfig::default();
        assert_eq!(config.max_idle_per_host, 5);
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert_eq!(config.response_header_timeout, Duration::from_secs(30));
        assert_eq!(config.total_timeout(), Duration::from_secs(45));
        assert!(!config.verbose);
    }

    #[test]
    fn test_verbose_adds_tracer() -> TestResult {
        let quiet = HttpTransport::new(&TransportConfig::default())?;
        let loud = HttpTransport::new(&TransportConfig::default().verbose(true))?;
        assert_eq!(quiet.chain_len(), 0);
        assert_eq!(loud.chain_len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_middleware_runs_in_order() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let hits = Arc::new(AtomicUsize::new(0));
        let transport = HttpTransport::new(&TransportConfig::default())?
            .with(Tag("first"))
            .with(Counter(Arc::clone(&hits)))
            .with(Tag("second"));

        let request = transport
            .client()
            .get(format!("{}/ping", server.uri()))
            .build()?;
        let response = transport.execute(request).await?;

        assert_eq!(response.status(), 200);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let received = server.received_requests().await.unwrap_or_default();
        let chain: Vec<_> = received
            .iter()
            .flat_map(|r| r.headers.get_all("x-chain"))
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert_eq!(chain, vec!["first,second"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_response_header_timeout() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let config =
            TransportConfig::default().response_header_timeout(Duration::from_millis(50));
        let transport = HttpTransport::new(&config)?;
        let request = transport.client().get(server.uri()).build()?;

        let result = transport.execute(request).await;

        assert!(matches!(result, Err(Error::Timeout { timeout_ms: 50 })));
        assert!(result.err().is_some_and(|e| e.is_transport()));
        Ok(())
    }

    #[tokio::test]
    async fn test_user_agent_is_sent() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(&TransportConfig::default())?;
        let request = transport.client().get(server.uri()).build()?;
        assert_eq!(transport.execute(request).await?.status(), 204);
        Ok(())
    }
}
