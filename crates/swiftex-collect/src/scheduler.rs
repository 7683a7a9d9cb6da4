//! Scheduler: one background task per collector, publishing into the
//! shared [`MetricStore`].
//!
//! Each task ticks at its collector's interval and awaits the run inline,
//! so runs of one family never overlap. A run that outlasts the interval
//! delays the next tick instead of queueing a burst: with a 5s interval and
//! a 7s run, runs start at 0s, 7s, 14s.

use std::sync::Arc;
use std::time::Duration;

use swiftex_core::Family;
use swiftex_store::MetricStore;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::collector::Collector;
use crate::error::CollectError;

/// Slack on top of the run ceiling before the scheduler gives up on a run.
pub const RUN_GRACE: Duration = Duration::from_secs(1);

/// What a single scheduled run did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// New samples were published.
    Published,
    /// The run failed; prior samples were kept.
    Failed,
    /// The collector hit a configuration error and was disabled.
    Disabled,
}

/// Owns the collectors and their background tasks.
pub struct Scheduler {
    store: MetricStore,
    collectors: Vec<Arc<Collector>>,
    tasks: Vec<(Family, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn new(store: MetricStore) -> Self {
        Self {
            store,
            collectors: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// Register a collector. Takes effect on the next `start`.
    pub fn add(&mut self, collector: Collector) {
        self.collectors.push(Arc::new(collector));
    }

    /// Families of the registered collectors, in registration order.
    pub fn families(&self) -> Vec<Family> {
        self.collectors.iter().map(|c| c.family()).collect()
    }

    /// Spawn one task per collector. Tasks run until `shutdown` flips or the
    /// collector is disabled.
    pub fn start(&mut self, shutdown: watch::Receiver<bool>) {
        if !self.tasks.is_empty() {
            warn!("scheduler already started");
            return;
        }
        for collector in &self.collectors {
            let family = collector.family();
            let handle = tokio::spawn(run_loop(
                Arc::clone(collector),
                self.store.clone(),
                shutdown.clone(),
            ));
            self.tasks.push((family, handle));
        }
        info!(collectors = self.tasks.len(), "scheduler started");
    }

    /// Wait for every task to finish.
    pub async fn join(&mut self) {
        for (family, handle) in self.tasks.drain(..) {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!(%family, error = %e, "collector task panicked");
                }
            }
        }
    }

    /// Abort every task without waiting for in-flight runs.
    pub fn stop_all(&mut self) {
        for (family, handle) in self.tasks.drain(..) {
            handle.abort();
            debug!(%family, "collector task stopped");
        }
        info!("all collector tasks stopped");
    }

    /// Run every collector once, concurrently, and publish the results.
    pub async fn collect_once(&self) -> Vec<(Family, RunOutcome)> {
        let mut runs = JoinSet::new();
        for (index, collector) in self.collectors.iter().enumerate() {
            let collector = Arc::clone(collector);
            let store = self.store.clone();
            runs.spawn(async move { (index, execute(&collector, &store).await) });
        }

        let mut outcomes: Vec<(Family, RunOutcome)> = self
            .collectors
            .iter()
            .map(|c| (c.family(), RunOutcome::Failed))
            .collect();
        while let Some(joined) = runs.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index].1 = outcome,
                Err(e) => error!(error = %e, "collection run panicked"),
            }
        }
        outcomes
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for (_, handle) in &self.tasks {
            handle.abort();
        }
    }
}

/// Run a collector once and apply the result to the store.
pub async fn execute(collector: &Collector, store: &MetricStore) -> RunOutcome {
    let family = collector.family();
    let budget = collector.run_ceiling().saturating_add(RUN_GRACE);

    match tokio::time::timeout(budget, collector.run()).await {
        Ok(Ok(set)) => {
            store.publish(family.as_str(), set);
            RunOutcome::Published
        }
        Ok(Err(e @ CollectError::RunFailed { .. })) => {
            warn!(%family, error = %e, "collection run failed, keeping previous samples");
            store.record_failure(family.as_str());
            RunOutcome::Failed
        }
        Ok(Err(CollectError::Configuration { reason, .. })) => {
            error!(%family, %reason, "collector disabled by configuration error");
            store.mark_disabled(family.as_str(), &reason);
            RunOutcome::Disabled
        }
        Err(_) => {
            warn!(
                %family,
                budget_ms = budget.as_millis() as u64,
                "collection run overran its ceiling"
            );
            store.record_failure(family.as_str());
            RunOutcome::Failed
        }
    }
}

/// The schedule loop for a single collector.
async fn run_loop(
    collector: Arc<Collector>,
    store: MetricStore,
    mut shutdown: watch::Receiver<bool>,
) {
    let family = collector.family();
    let mut ticker = tokio::time::interval(collector.config().interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(
        %family,
        interval_secs = collector.config().interval.as_secs_f64(),
        "collector loop starting"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        tokio::select! {
            outcome = execute(&collector, &store) => {
                if outcome == RunOutcome::Disabled {
                    return;
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    debug!(%family, "collector loop shutting down");
}
