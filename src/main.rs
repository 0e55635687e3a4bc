//! # ghrepo - GitHub repository controller
//!
//! Loads a manifest, wires the in-memory stores and the Repo reconciler, and
//! then either runs the reconciliation loop until interrupted, reconciles a
//! single deletion, or validates the manifest.
//!
//! ## Shutdown
//!
//! SIGINT stops the loop. In-flight reconciliations are dropped, which aborts
//! their HTTP calls; the next start observes again from scratch.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ghrepo::cli::{Cli, Commands, OptionOverrides};
use ghrepo::{Controller, load_manifest, settings, summarize};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Commands::Run {
            manifest,
            config,
            overrides,
            once,
        } => run(&manifest, config.as_deref(), &overrides, once).await,
        Commands::Delete { manifest, name } => delete(&manifest, &name).await,
        Commands::Validate { manifest } => validate(&manifest),
    }
}

/// Initialize tracing: `RUST_LOG` wins, otherwise info (or debug with `--debug`).
fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(
    manifest_path: &Path,
    config: Option<&Path>,
    overrides: &OptionOverrides,
    once: bool,
) -> Result<()> {
    let options = settings::load(config, overrides)?;
    let manifest = load_manifest(manifest_path)?;
    info!(manifest = %manifest_path.display(), records = %summarize(&manifest), "Manifest loaded");

    let controller = Controller::new(manifest, None);

    if once {
        let report = controller.run_once(options).await?;
        println!("{report}");
        for (name, reason) in &report.failed {
            println!("  {name}: {reason}");
        }
        if !report.is_clean() {
            bail!("{} repo(s) failed to reconcile", report.failed.len());
        }
        return Ok(());
    }

    let reconciliation_loop = controller.reconciliation_loop(options)?;
    let stopper = reconciliation_loop.stopper();

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received, stopping"),
            Err(e) => warn!(error = %e, "Cannot listen for interrupt; stopping"),
        }
        stopper.stop();
    });

    reconciliation_loop
        .run()
        .await
        .context("Reconciliation loop failed")
}

async fn delete(manifest_path: &Path, name: &str) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    let controller = Controller::new(manifest, None);

    let outcome = controller.delete(name).await?;
    println!("{name}: {outcome}");
    Ok(())
}

fn validate(manifest_path: &Path) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    println!("{}: {}", manifest_path.display(), summarize(&manifest));
    Ok(())
}
