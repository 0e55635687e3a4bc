//! Controller option layering: defaults, then an optional TOML file, then
//! command-line flags.

use std::path::Path;

use anyhow::{Context, Result};
use ghrepo_reconciler::ControllerOptions;
use tracing::debug;

use crate::cli::OptionOverrides;

/// Build the controller options for a run.
///
/// # Errors
///
/// Fails if the file cannot be read or parsed, or if the final options do not
/// validate.
pub fn load(config: Option<&Path>, overrides: &OptionOverrides) -> Result<ControllerOptions> {
    let base = match config {
        Some(path) => from_file(path)?,
        None => ControllerOptions::default(),
    };
    let options = apply(base, overrides);
    options.validate().context("Invalid controller options")?;
    debug!(?options, "Controller options");
    Ok(options)
}

fn from_file(path: &Path) -> Result<ControllerOptions> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

fn apply(options: ControllerOptions, overrides: &OptionOverrides) -> ControllerOptions {
    ControllerOptions {
        poll_interval: overrides.poll.unwrap_or(options.poll_interval),
        max_concurrent_reconciles: overrides
            .max_concurrent
            .unwrap_or(options.max_concurrent_reconciles),
        max_reconcile_rate: overrides
            .max_reconcile_rate
            .unwrap_or(options.max_reconcile_rate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_defaults_without_file_or_flags() -> Result<()> {
        let options = load(None, &OptionOverrides::default())?;
        assert_eq!(options, ControllerOptions::default());
        Ok(())
    }

    #[test]
    fn test_flags_override_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "poll_interval = \"10m\"")?;
        writeln!(file, "max_reconcile_rate = 2")?;

        let overrides = OptionOverrides {
            max_reconcile_rate: Some(8),
            ..OptionOverrides::default()
        };
        let options = load(Some(file.path()), &overrides)?;

        assert_eq!(options.poll_interval, Duration::from_secs(600));
        assert_eq!(options.max_reconcile_rate, 8);
        assert_eq!(options.max_concurrent_reconciles, 5);
        Ok(())
    }

    #[test]
    fn test_unknown_key_is_rejected() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "workers = 3")?;

        assert!(load(Some(file.path()), &OptionOverrides::default()).is_err());
        Ok(())
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let overrides = OptionOverrides {
            max_concurrent: Some(0),
            ..OptionOverrides::default()
        };
        assert!(load(None, &overrides).is_err());
    }
}
