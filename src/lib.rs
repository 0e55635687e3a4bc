#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # ghrepo
//!
//! Command-line controller that keeps the GitHub repositories declared in a
//! YAML manifest in existence.
//!
//! - [`cli`]: command definitions.
//! - [`settings`]: controller option layering.
//! - [`app`]: manifest loading and controller wiring.

pub mod app;
pub mod cli;
pub mod settings;

pub use app::{Controller, load_manifest, summarize};
pub use cli::{Cli, Commands, OptionOverrides};
