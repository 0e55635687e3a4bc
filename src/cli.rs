//! CLI command definitions using clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

/// ghrepo - GitHub repository controller
#[derive(Parser, Debug)]
#[command(name = "ghrepo")]
#[command(version)]
#[command(about = "Keeps declared GitHub repositories in existence")]
#[command(
    long_about = "ghrepo reads Repo, ProviderConfig and Secret records from a YAML manifest and reconciles them against the GitHub API: missing repositories are created, repositories marked for deletion are removed."
)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile every repo in a manifest, continuously or once
    Run {
        /// Manifest file (multi-document YAML)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Controller options file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        overrides: OptionOverrides,

        /// Run a single cycle and exit
        #[arg(long, default_value_t = false)]
        once: bool,
    },

    /// Mark a repo for deletion and reconcile it once
    Delete {
        /// Manifest file (multi-document YAML)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Repo record name
        #[arg(short, long)]
        name: String,
    },

    /// Parse and validate a manifest without contacting GitHub
    Validate {
        /// Manifest file (multi-document YAML)
        #[arg(short, long)]
        manifest: PathBuf,
    },
}

/// Command-line overrides for controller options.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionOverrides {
    /// Time between reconciliation cycles (e.g. 30s, 2m)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub poll: Option<Duration>,

    /// Reconciliations allowed in flight at once
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Reconciliations started per second
    #[arg(long)]
    pub max_reconcile_rate: Option<u32>,
}
