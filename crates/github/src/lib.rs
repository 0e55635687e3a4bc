#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # ghrepo-github
//!
//! A small GitHub REST client covering exactly what repository reconciliation
//! needs: the organization check, repository get/exists, create and delete.
//!
//! A 404 is a normal answer, not a failure: [`Repos::exists`] returns `false`,
//! [`Repos::delete`] succeeds and [`GithubClient::is_organization`] reports a
//! user.
//!
//! ## Example
//!
//! ```ignore
//! use ghrepo_github::{ClientOptions, GithubClient, HttpTransport, Token, TransportConfig};
//!
//! let client = GithubClient::new(ClientOptions {
//!     api_url: Some("https://ghe.example.com/api/v3".into()),
//!     token: Token::new(token),
//!     transport: HttpTransport::new(&TransportConfig::default())?,
//! })?;
//!
//! if !client.repos().exists("acme", "widgets").await? {
//!     client.repos().create(&params).await?;
//! }
//! ```

pub mod client;
pub mod endpoint;
pub mod error;
pub mod repos;
pub mod trace;
pub mod transport;

pub use client::{ClientOptions, GITHUB_MEDIA_TYPE, GithubClient, Token};
pub use endpoint::{ApiEndpoint, DEFAULT_API_URL};
pub use error::{Error, FieldError, GithubError, Result};
pub use repos::{CreateRepository, RemoteRepository, Repos};
pub use trace::VerboseTracer;
pub use transport::{HttpTransport, Middleware, Next, TransportConfig, USER_AGENT};
