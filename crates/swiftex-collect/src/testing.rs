//! Test doubles shared by the collector and scheduler tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use swiftex_core::{CollectorConfig, Family, Target};
use swiftex_probe::{ProbeError, ProbeFuture, ReconEndpoint, ReconPayload, ReconProbe};
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub enum Behavior {
    Respond(String),
    Fail(ProbeError),
    /// Fail the first `n` calls, then respond.
    FailThenRespond(u32, ProbeError, String),
    /// Sleep, then respond.
    Delay(Duration, String),
    /// Never answer.
    Hang,
    /// Answer with a payload for a different endpoint.
    WrongVariant,
}

/// A scripted [`ReconProbe`] keyed by host.
#[derive(Debug, Default)]
pub struct FakeProbe {
    behaviors: HashMap<String, Behavior>,
    calls: Mutex<Vec<(String, Instant)>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Counts one call as in flight until dropped, including on cancellation.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, host: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(host.to_string(), behavior);
        self
    }

    pub fn calls_for(&self, host: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(h, _)| h == host)
            .count()
    }

    /// Instants at which probes were issued, in call order.
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    /// Highest number of calls that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl ReconProbe for FakeProbe {
    fn probe<'a>(
        &'a self,
        target: &'a Target,
        endpoint: ReconEndpoint,
        _timeout: Duration,
    ) -> ProbeFuture<'a> {
        Box::pin(async move {
            let previous = {
                let mut calls = self.calls.lock().unwrap();
                let previous = calls.iter().filter(|(h, _)| *h == target.host).count();
                calls.push((target.host.clone(), Instant::now()));
                previous as u32
            };
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            let _guard = InFlight(&self.in_flight);

            match self.behaviors.get(&target.host) {
                Some(Behavior::Respond(body)) => endpoint.decode(body.as_bytes()),
                Some(Behavior::Fail(e)) => Err(e.clone()),
                Some(Behavior::FailThenRespond(n, e, body)) => {
                    if previous < *n {
                        Err(e.clone())
                    } else {
                        endpoint.decode(body.as_bytes())
                    }
                }
                Some(Behavior::Delay(d, body)) => {
                    tokio::time::sleep(*d).await;
                    endpoint.decode(body.as_bytes())
                }
                Some(Behavior::Hang) => std::future::pending().await,
                Some(Behavior::WrongVariant) => Ok(ReconPayload::Unmounted(Vec::new())),
                None => Err(ProbeError::Connection(format!("no route to {target}"))),
            }
        })
    }
}

pub fn collector_config(family: Family) -> CollectorConfig {
    CollectorConfig {
        family,
        interval: Duration::from_secs(60),
        probe_timeout: Duration::from_secs(5),
        run_ceiling: Duration::from_secs(30),
        concurrency: 16,
        retries: 0,
        expected_ring_md5: BTreeMap::new(),
    }
}

/// A `/recon/diskusage` body with one mounted device of size 1000.
pub fn disk_body(device: &str, used: u64) -> String {
    format!(
        r#"[{{"device":"{device}","mounted":true,"size":1000,"used":{used},"avail":{}}}]"#,
        1000 - used
    )
}
