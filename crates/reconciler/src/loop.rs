//! Continuous reconciliation loop.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::managed::Managed;
use crate::reconciler::ManagedReconciler;
use crate::store::ManagedStore;
use crate::types::CycleReport;

/// Process-wide controller settings, handed to the loop at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerOptions {
    /// Time between passes over every record.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Reconciliations allowed in flight at once.
    pub max_concurrent_reconciles: usize,

    /// Reconciliations started per second, across all records.
    pub max_reconcile_rate: u32,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(120),
            max_concurrent_reconciles: 5,
            max_reconcile_rate: 5,
        }
    }
}

impl ControllerOptions {
    /// Check every limit is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a zero interval, concurrency or
    /// rate.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::invalid_config("poll interval must be positive"));
        }
        if self.max_concurrent_reconciles == 0 {
            return Err(Error::invalid_config(
                "max concurrent reconciles must be at least 1",
            ));
        }
        if self.max_reconcile_rate == 0 {
            return Err(Error::invalid_config(
                "max reconcile rate must be at least 1 per second",
            ));
        }
        Ok(())
    }
}

/// Spaces reconciliation starts evenly to at most `rate` per second.
#[derive(Debug)]
pub struct GlobalRateLimiter {
    period: Duration,
    next: Mutex<Option<Instant>>,
}

impl GlobalRateLimiter {
    /// A limiter admitting `rate` starts per second. A rate of zero admits
    /// one per second.
    pub fn new(rate: u32) -> Self {
        let second = Duration::from_secs(1);
        Self {
            period: second.checked_div(rate).unwrap_or(second),
            next: Mutex::new(None),
        }
    }

    /// Time between admitted starts.
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Wait for the next free slot.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot.checked_add(self.period).unwrap_or(slot));
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

/// Continuous reconciliation loop.
///
/// Every `poll_interval` it reconciles every stored record, at most
/// `max_concurrent_reconciles` at a time and starting no more than
/// `max_reconcile_rate` per second. Stopping drops the in-flight
/// reconciliations, which aborts their HTTP calls.
pub struct ReconciliationLoop<M: Managed> {
    reconciler: Arc<ManagedReconciler<M>>,
    store: Arc<dyn ManagedStore<M>>,
    options: ControllerOptions,
    limiter: GlobalRateLimiter,
    stop_rx: watch::Receiver<bool>,
    stop_tx: watch::Sender<bool>,
}

impl<M: Managed> ReconciliationLoop<M> {
    /// Create a new reconciliation loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `options` do not validate.
    pub fn new(
        reconciler: Arc<ManagedReconciler<M>>,
        store: Arc<dyn ManagedStore<M>>,
        options: ControllerOptions,
    ) -> Result<Self> {
        options.validate()?;
        let (stop_tx, stop_rx) = watch::channel(false);
        Ok(Self {
            reconciler,
            store,
            limiter: GlobalRateLimiter::new(options.max_reconcile_rate),
            options,
            stop_rx,
            stop_tx,
        })
    }

    /// The loop's settings.
    pub const fn options(&self) -> &ControllerOptions {
        &self.options
    }

    /// Run until stopped.
    ///
    /// Failed reconciliations are logged and retried on the next tick; they
    /// never end the loop.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok(())` once stopped.
    pub async fn run(&self) -> Result<()> {
        info!(
            controller = M::KIND,
            poll_interval = %humantime::format_duration(self.options.poll_interval),
            max_concurrent = self.options.max_concurrent_reconciles,
            max_rate = self.options.max_reconcile_rate,
            "Starting reconciliation loop"
        );

        let mut stop_rx = self.stop_rx.clone();
        let mut interval = tokio::time::interval(self.options.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                () = stopped(&mut stop_rx) => break,
            }

            tokio::select! {
                result = self.reconcile_once() => match result {
                    Ok(report) if report.is_clean() => {
                        debug!(controller = M::KIND, %report, "Cycle complete");
                    }
                    Ok(report) => {
                        warn!(controller = M::KIND, %report, "Cycle complete with failures");
                    }
                    Err(e) => {
                        error!(controller = M::KIND, error = %e, "Cannot list records");
                    }
                },
                () = stopped(&mut stop_rx) => break,
            }
        }

        info!(controller = M::KIND, "Reconciliation loop stopped");
        Ok(())
    }

    /// Reconcile every stored record once.
    ///
    /// # Errors
    ///
    /// Fails only if the records cannot be listed; individual failures are
    /// collected in the report.
    pub async fn reconcile_once(&self) -> Result<CycleReport> {
        let names: Vec<String> = self
            .store
            .list()
            .await?
            .iter()
            .map(|record| record.name().to_string())
            .collect();

        debug!(controller = M::KIND, records = names.len(), "Starting cycle");

        let results: Vec<_> = futures::stream::iter(names)
            .map(|name| async move {
                self.limiter.acquire().await;
                let result = self.reconciler.reconcile(&name).await;
                (name, result)
            })
            .buffer_unordered(self.options.max_concurrent_reconciles)
            .collect()
            .await;

        let mut report = CycleReport::default();
        for (name, result) in results {
            match result {
                Ok(outcome) => report.record(outcome),
                Err(e) => report.fail(name, e),
            }
        }
        Ok(report)
    }

    /// Stop the loop.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Get a stopper handle.
    pub fn stopper(&self) -> LoopStopper {
        LoopStopper {
            stop_tx: self.stop_tx.clone(),
        }
    }
}

/// Resolves once a stop has been requested.
async fn stopped(stop_rx: &mut watch::Receiver<bool>) {
    while !*stop_rx.borrow_and_update() {
        if stop_rx.changed().await.is_err() {
            // Sender gone: nobody can stop us any more.
            std::future::pending::<()>().await;
        }
    }
}

/// Handle to stop a reconciliation loop.
#[derive(Clone)]
pub struct LoopStopper {
    stop_tx: watch::Sender<bool>,
}

impl LoopStopper {
    /// Stop the loop.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InMemoryRecorder;
    use crate::reconciler::testing::{FakeConnector, FakeGithub};
    use crate::store::{InMemoryManagedStore, InMemoryUsageTracker};
    use ghrepo_core::{Repo, RepoParams};

    fn repo(name: &str) -> Repo {
        Repo::new(name, RepoParams::new("acme", name)).with_provider_config("default")
    }

    fn setup(
        github: FakeGithub,
        repos: Vec<Repo>,
        options: ControllerOptions,
    ) -> Result<(ReconciliationLoop<Repo>, Arc<FakeGithub>)> {
        let store = Arc::new(InMemoryManagedStore::new(repos));
        let github = Arc::new(github);
        let reconciler = Arc::new(ManagedReconciler::new(
            store.clone(),
            Arc::new(FakeConnector(github.clone())),
            Arc::new(InMemoryUsageTracker::new()),
            Arc::new(InMemoryRecorder::new()),
        ));
        let loop_runner = ReconciliationLoop::new(reconciler, store, options)?;
        Ok((loop_runner, github))
    }

    fn fast() -> ControllerOptions {
        ControllerOptions {
            poll_interval: Duration::from_millis(20),
            max_concurrent_reconciles: 2,
            max_reconcile_rate: 1_000,
        }
    }

    // ===== Behavior-Driven Tests =====

    /// Given an empty store
    /// When the loop runs one cycle
    /// Then the report is empty and clean
    #[tokio::test]
    async fn empty_store_is_a_clean_cycle() -> Result<()> {
        let (loop_runner, _) = setup(FakeGithub::default(), vec![], fast())?;

        let report = loop_runner.reconcile_once().await?;

        assert_eq!(report, CycleReport::default());
        Ok(())
    }

    /// Given three repos of which one already exists
    /// When the loop runs one cycle
    /// Then the other two are created
    #[tokio::test]
    async fn cycle_creates_missing_repos() -> Result<()> {
        let (loop_runner, github) = setup(
            FakeGithub::with_repos(["acme/a"]),
            vec![repo("a"), repo("b"), repo("c")],
            fast(),
        )?;

        let report = loop_runner.reconcile_once().await?;

        assert_eq!(report.created, 2);
        assert_eq!(report.up_to_date, 1);
        assert!(report.is_clean());
        assert_eq!(github.creates(), 2);

        let second = loop_runner.reconcile_once().await?;
        assert_eq!(second.up_to_date, 3);
        assert_eq!(github.creates(), 2);
        Ok(())
    }

    /// Given an external system that always fails
    /// When the loop runs one cycle
    /// Then every record is reported as failed without aborting the cycle
    #[tokio::test]
    async fn failures_are_collected() -> Result<()> {
        let github = FakeGithub {
            fail_observe: true,
            ..FakeGithub::default()
        };
        let (loop_runner, _) = setup(github, vec![repo("a"), repo("b")], fast())?;

        let report = loop_runner.reconcile_once().await?;

        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.total(), 2);
        Ok(())
    }

    /// Given a loop that is running
    /// When stop() is called
    /// Then the loop should exit gracefully
    #[tokio::test]
    async fn stop_signal_terminates_loop() -> Result<()> {
        let (loop_runner, github) = setup(FakeGithub::default(), vec![repo("a")], fast())?;
        let stopper = loop_runner.stopper();

        let handle = tokio::spawn(async move { loop_runner.run().await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        stopper.stop();

        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok(), "Loop should stop within timeout");
        assert!(matches!(result, Ok(Ok(Ok(())))));
        assert_eq!(github.creates(), 1);
        Ok(())
    }

    /// Given a loop stopped before it starts
    /// When run() is called
    /// Then it returns immediately
    #[tokio::test]
    async fn stop_before_run_returns_immediately() -> Result<()> {
        let (loop_runner, github) = setup(FakeGithub::default(), vec![repo("a")], fast())?;
        loop_runner.stop();

        let result = tokio::time::timeout(Duration::from_secs(1), loop_runner.run()).await;

        assert!(matches!(result, Ok(Ok(()))));
        assert_eq!(github.creates(), 0);
        Ok(())
    }

    #[test]
    fn test_options_defaults() {
        let options = ControllerOptions::default();
        assert_eq!(options.poll_interval, Duration::from_secs(120));
        assert_eq!(options.max_concurrent_reconciles, 5);
        assert_eq!(options.max_reconcile_rate, 5);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_from_toml() -> std::result::Result<(), toml::de::Error> {
        let options: ControllerOptions =
            toml::from_str("poll_interval = \"30s\"\nmax_concurrent_reconciles = 10\n")?;
        assert_eq!(options.poll_interval, Duration::from_secs(30));
        assert_eq!(options.max_concurrent_reconciles, 10);
        assert_eq!(options.max_reconcile_rate, 5);
        Ok(())
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        let options = ControllerOptions {
            max_concurrent_reconciles: 0,
            ..ControllerOptions::default()
        };
        assert!(matches!(options.validate(), Err(Error::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn test_rate_limiter_spaces_starts() {
        let limiter = GlobalRateLimiter::new(20);
        assert_eq!(limiter.period(), Duration::from_millis(50));

        let start = Instant::now();
        for _ in 0..4 {
            limiter.acquire().await;
        }

        // First start is immediate, the next three wait one period each.
        assert!(start.elapsed() >= Duration::from_millis(150));
    }
}
