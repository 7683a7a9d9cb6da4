//! Collector: one run of one family across every discovered node.
//!
//! A run resolves targets, probes them concurrently (bounded by the
//! family's concurrency limit), retries transient failures, and aggregates
//! whatever succeeded into a single [`SampleSet`]. The whole run is bounded
//! by the family's run ceiling: probes still in flight when it expires are
//! abandoned and counted as failed.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use swiftex_core::{CollectorConfig, Family, Target, defaults};
use swiftex_probe::{ProbeError, ProbeResult, ReconEndpoint, ReconPayload, ReconProbe};
use swiftex_store::{SampleSet, SampleSetBuilder, labels};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::discovery::Discovery;
use crate::error::{CollectError, CollectResult, DiscoveryError};
use crate::families::{self, AggregateContext, NodeReport};

pub const COLLECTION_ERRORS: &str = "swift_exporter_collection_errors";

/// Pause between attempts at a target after a transient failure.
pub const RETRY_PAUSE: Duration = Duration::from_millis(250);

/// Collects one family. Immutable once built; runs never overlap because
/// the scheduler awaits each run before starting the next.
pub struct Collector {
    config: CollectorConfig,
    probe: Arc<dyn ReconProbe>,
    discovery: Arc<dyn Discovery>,
}

impl Collector {
    pub fn new(
        config: CollectorConfig,
        probe: Arc<dyn ReconProbe>,
        discovery: Arc<dyn Discovery>,
    ) -> Self {
        Self {
            config,
            probe,
            discovery,
        }
    }

    pub fn family(&self) -> Family {
        self.config.family
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Wall-clock bound of one run. Configs built outside the validated
    /// loader are capped at [`defaults::MAX_RUN_CEILING`].
    pub fn run_ceiling(&self) -> Duration {
        self.config.run_ceiling.min(defaults::MAX_RUN_CEILING)
    }

    /// Run one collection pass.
    ///
    /// Succeeds when at least one target produced usable data; failed
    /// targets are logged and counted in `swift_exporter_collection_errors`.
    pub async fn run(&self) -> CollectResult<SampleSet> {
        let family = self.config.family;
        let endpoint = families::endpoint(family);

        let targets = self.discovery.targets().await.map_err(|e| match e {
            DiscoveryError::Malformed(err) => CollectError::Configuration {
                family,
                reason: err.to_string(),
            },
            DiscoveryError::Unavailable(reason) => {
                warn!(%family, %reason, "no targets available");
                CollectError::RunFailed {
                    family,
                    failed: 0,
                    total: 0,
                }
            }
        })?;

        if targets.is_empty() {
            warn!(%family, "target list is empty");
            return Err(CollectError::RunFailed {
                family,
                failed: 0,
                total: 0,
            });
        }

        let total = targets.len();
        let mut reports = Vec::with_capacity(total);
        let mut failed = 0usize;

        for (target, outcome) in self.probe_all(targets, endpoint).await {
            let error = match outcome {
                Ok(payload) if payload.endpoint() == endpoint => {
                    reports.push(NodeReport { target, payload });
                    continue;
                }
                Ok(payload) => ProbeError::Validation(format!(
                    "expected {endpoint} payload, got {}",
                    payload.endpoint()
                )),
                Err(e) => e,
            };
            failed += 1;
            warn!(
                %family,
                node = %target,
                error_kind = error.kind(),
                error = %error,
                "probe failed"
            );
        }

        if reports.is_empty() {
            return Err(CollectError::RunFailed {
                family,
                failed,
                total,
            });
        }

        let ctx = AggregateContext {
            now: SystemTime::now(),
            expected_ring_md5: &self.config.expected_ring_md5,
        };
        let mut builder = SampleSetBuilder::new();
        families::aggregate(family, &reports, &ctx, &mut builder);
        builder
            .describe(
                COLLECTION_ERRORS,
                "Targets that failed during the family's last successful run.",
            )
            .push(
                COLLECTION_ERRORS,
                labels([("family", family.as_str())]),
                failed,
            );

        let set = builder.build();
        info!(
            %family,
            targets = total,
            failed,
            samples = set.len(),
            "collection run complete"
        );
        Ok(set)
    }

    /// Probe every target, at most `concurrency` at a time, within the run
    /// ceiling. Results come back in target order.
    async fn probe_all(
        &self,
        targets: Vec<Target>,
        endpoint: ReconEndpoint,
    ) -> Vec<(Target, ProbeResult<ReconPayload>)> {
        let ceiling = self.run_ceiling();
        let deadline = Instant::now() + ceiling;
        let permits = self.config.concurrency.clamp(1, Semaphore::MAX_PERMITS);
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut tasks = JoinSet::new();

        for (index, target) in targets.iter().cloned().enumerate() {
            let probe = Arc::clone(&self.probe);
            let semaphore = Arc::clone(&semaphore);
            let timeout = self.config.probe_timeout.min(ceiling);
            let retries = self.config.retries;
            tasks.spawn(async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                let result = probe_with_retries(&*probe, &target, endpoint, timeout, retries).await;
                (index, result)
            });
        }

        let mut results: Vec<Option<ProbeResult<ReconPayload>>> =
            (0..targets.len()).map(|_| None).collect();
        let mut ceiling_hit = false;

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((index, result)))) => results[index] = Some(result),
                Ok(Some(Err(e))) => warn!(error = %e, "probe task failed"),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        family = %self.config.family,
                        outstanding = tasks.len(),
                        ceiling_ms = ceiling.as_millis() as u64,
                        "run ceiling reached, abandoning outstanding probes"
                    );
                    tasks.abort_all();
                    ceiling_hit = true;
                    break;
                }
            }
        }

        targets
            .into_iter()
            .zip(results)
            .map(|(target, result)| {
                let result = result.unwrap_or_else(|| {
                    Err(if ceiling_hit {
                        ProbeError::Timeout(ceiling)
                    } else {
                        ProbeError::Connection("probe task did not complete".to_string())
                    })
                });
                (target, result)
            })
            .collect()
    }
}

/// One target, up to `retries + 1` attempts, retrying only transient
/// failures. Each attempt is bounded by `timeout` even if the probe
/// implementation ignores it.
async fn probe_with_retries(
    probe: &dyn ReconProbe,
    target: &Target,
    endpoint: ReconEndpoint,
    timeout: Duration,
    retries: u32,
) -> ProbeResult<ReconPayload> {
    let mut attempt = 0u32;
    loop {
        let result = tokio::time::timeout(timeout, probe.probe(target, endpoint, timeout))
            .await
            .unwrap_or(Err(ProbeError::Timeout(timeout)));

        match result {
            Err(e) if e.is_transient() && attempt < retries => {
                attempt += 1;
                debug!(node = %target, %endpoint, attempt, error = %e, "retrying probe");
                tokio::time::sleep(RETRY_PAUSE).await;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::DISK_USED;
    use crate::testing::{Behavior, FakeProbe, collector_config, disk_body};
    use crate::discovery::StaticDiscovery;
    use swiftex_core::ConfigError;
    use swiftex_store::SampleValue;

    fn collector(config: CollectorConfig, probe: Arc<FakeProbe>, hosts: &[&str]) -> Collector {
        let targets = hosts.iter().map(|h| Target::new(*h, 6000)).collect();
        Collector::new(config, probe, Arc::new(StaticDiscovery::new(targets)))
    }

    #[tokio::test]
    async fn malformed_node_is_counted_not_fatal() {
        let probe = Arc::new(
            FakeProbe::new()
                .on("n1", Behavior::Respond(disk_body("sdb", 10)))
                .on("n2", Behavior::Respond(disk_body("sdb", 20)))
                .on("n3", Behavior::Respond("{not json".to_string())),
        );
        let c = collector(collector_config(Family::DiskUsage), probe, &["n1", "n2", "n3"]);

        let set = c.run().await.unwrap();
        let used: Vec<f64> = set.named(DISK_USED).map(|s| s.value.as_f64()).collect();
        assert_eq!(used, vec![10.0, 20.0]);
        assert_eq!(
            set.value(COLLECTION_ERRORS, &labels([("family", "disk_usage")])),
            Some(SampleValue::Integer(1))
        );
    }

    #[tokio::test]
    async fn all_targets_failing_is_run_failed() {
        let probe = Arc::new(
            FakeProbe::new()
                .on("n1", Behavior::Fail(ProbeError::Status(503)))
                .on("n2", Behavior::Fail(ProbeError::Connection("refused".into()))),
        );
        let c = collector(collector_config(Family::Load), probe, &["n1", "n2"]);

        match c.run().await {
            Err(CollectError::RunFailed { failed, total, .. }) => {
                assert_eq!((failed, total), (2, 2));
            }
            other => panic!("expected RunFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_target_list_is_run_failed() {
        let c = collector(collector_config(Family::Load), Arc::new(FakeProbe::new()), &[]);
        assert!(matches!(
            c.run().await,
            Err(CollectError::RunFailed { total: 0, .. })
        ));
    }

    #[tokio::test]
    async fn wrong_payload_variant_is_a_failed_target() {
        let probe = Arc::new(
            FakeProbe::new()
                .on("n1", Behavior::Respond(disk_body("sdb", 10)))
                .on("n2", Behavior::WrongVariant),
        );
        let c = collector(collector_config(Family::DiskUsage), probe, &["n1", "n2"]);

        let set = c.run().await.unwrap();
        assert_eq!(set.named(DISK_USED).count(), 1);
        assert_eq!(
            set.value(COLLECTION_ERRORS, &labels([("family", "disk_usage")])),
            Some(SampleValue::Integer(1))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let probe = Arc::new(FakeProbe::new().on(
            "n1",
            Behavior::FailThenRespond(2, ProbeError::Connection("reset".into()), disk_body("sdb", 1)),
        ));
        let mut config = collector_config(Family::DiskUsage);
        config.retries = 2;
        let c = collector(config, Arc::clone(&probe), &["n1"]);

        let set = c.run().await.unwrap();
        assert_eq!(set.named(DISK_USED).count(), 1);
        assert_eq!(probe.calls_for("n1"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_failures_are_not_retried() {
        let probe = Arc::new(
            FakeProbe::new()
                .on("n1", Behavior::Fail(ProbeError::Status(500)))
                .on("n2", Behavior::Respond(disk_body("sdb", 1))),
        );
        let mut config = collector_config(Family::DiskUsage);
        config.retries = 3;
        let c = collector(config, Arc::clone(&probe), &["n1", "n2"]);

        c.run().await.unwrap();
        assert_eq!(probe.calls_for("n1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_probe_is_bounded_by_probe_timeout() {
        let probe = Arc::new(
            FakeProbe::new()
                .on("n1", Behavior::Hang)
                .on("n2", Behavior::Respond(disk_body("sdb", 1))),
        );
        let mut config = collector_config(Family::DiskUsage);
        config.probe_timeout = Duration::from_secs(2);
        let c = collector(config, probe, &["n1", "n2"]);

        let started = Instant::now();
        let set = c.run().await.unwrap();
        assert!(started.elapsed() <= Duration::from_secs(2) + Duration::from_millis(100));
        assert_eq!(
            set.value(COLLECTION_ERRORS, &labels([("family", "disk_usage")])),
            Some(SampleValue::Integer(1))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_never_outlives_its_ceiling() {
        let mut probe = FakeProbe::new();
        for i in 0..8 {
            probe = probe.on(&format!("n{i}"), Behavior::Hang);
        }
        let probe = probe.on("fast", Behavior::Respond(disk_body("sdb", 1)));

        let mut config = collector_config(Family::DiskUsage);
        config.concurrency = 1;
        config.retries = 5;
        config.probe_timeout = Duration::from_secs(2);
        config.run_ceiling = Duration::from_secs(3);
        let hosts = ["n0", "n1", "n2", "n3", "fast", "n4", "n5", "n6", "n7"];
        let c = collector(config, Arc::new(probe), &hosts);

        let started = Instant::now();
        let outcome = c.run().await;
        assert!(started.elapsed() <= Duration::from_secs(3) + Duration::from_millis(100));

        // Whether `fast` got its turn depends on permit order. Every hung
        // target is a failure either way.
        match outcome {
            Err(CollectError::RunFailed { failed, total, .. }) => {
                assert_eq!((failed, total), (9, 9));
            }
            Ok(set) => {
                assert_eq!(set.named(DISK_USED).count(), 1);
                assert_eq!(
                    set.value(COLLECTION_ERRORS, &labels([("family", "disk_usage")])),
                    Some(SampleValue::Integer(8))
                );
            }
            Err(other) => panic!("expected RunFailed or a partial set, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_caps_probes_in_flight() {
        let mut probe = FakeProbe::new();
        let mut hosts = Vec::new();
        for i in 0..10 {
            let host = format!("n{i}");
            probe = probe.on(&host, Behavior::Delay(Duration::from_secs(1), disk_body("sdb", 1)));
            hosts.push(host);
        }
        let probe = Arc::new(probe);
        let hosts: Vec<&str> = hosts.iter().map(String::as_str).collect();

        let mut config = collector_config(Family::DiskUsage);
        config.concurrency = 3;
        let c = collector(config, Arc::clone(&probe), &hosts);

        let started = Instant::now();
        let set = c.run().await.unwrap();
        assert_eq!(set.named(DISK_USED).count(), 10);
        assert_eq!(probe.peak_in_flight(), 3);
        // Ten one-second probes, three at a time.
        assert!(started.elapsed() >= Duration::from_secs(4));
        assert!(started.elapsed() <= Duration::from_secs(4) + Duration::from_millis(100));
    }

    #[tokio::test]
    async fn malformed_discovery_is_a_configuration_error() {
        struct Broken;
        impl Discovery for Broken {
            fn targets(&self) -> crate::discovery::DiscoveryFuture<'_> {
                Box::pin(async {
                    Err(DiscoveryError::Malformed(ConfigError::InvalidTarget {
                        entry: "bad host".into(),
                        reason: "host contains invalid characters".into(),
                    }))
                })
            }
        }

        let c = Collector::new(
            collector_config(Family::Unmounted),
            Arc::new(FakeProbe::new()),
            Arc::new(Broken),
        );
        assert!(matches!(
            c.run().await,
            Err(CollectError::Configuration { family: Family::Unmounted, .. })
        ));
    }
}
