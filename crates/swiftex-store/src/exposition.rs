//! Scrape exposition.
//!
//! Renders a [`Snapshot`] through `prometheus-client`'s text encoder. The
//! snapshot is registered as a custom collector, so every scrape encodes
//! exactly the samples the store held at one instant. Samples from every
//! published family are grouped by metric name under one descriptor;
//! exporter status samples are added for every family the store knows
//! about.

use std::collections::BTreeMap;
use std::fmt;
use std::time::UNIX_EPOCH;

use prometheus_client::collector::Collector;
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{DescriptorEncoder, MetricEncoder};
use prometheus_client::metrics::MetricType;
use prometheus_client::registry::Registry;

use crate::error::ScrapeResult;
use crate::sample::{Sample, SampleSet, SampleSetBuilder, SampleValue, labels};
use crate::store::Snapshot;

/// Content type of the rendered exposition.
pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

pub const LAST_SUCCESS_AGE: &str = "swift_exporter_last_success_age_seconds";
pub const LAST_ATTEMPT_TIMESTAMP: &str = "swift_exporter_last_attempt_timestamp_seconds";
pub const CONSECUTIVE_FAILURES: &str = "swift_exporter_consecutive_failures";
pub const COLLECTOR_DISABLED: &str = "swift_exporter_collector_disabled";

/// Render a snapshot as OpenMetrics text.
///
/// All metrics are exposed as gauges.
pub fn render_exposition(snapshot: &Snapshot) -> ScrapeResult<String> {
    let mut registry = Registry::default();
    registry.register_collector(Box::new(SnapshotCollector {
        status: status_samples(snapshot),
        snapshot: snapshot.clone(),
    }));

    let mut out = String::new();
    encode(&mut out, &registry)?;
    Ok(out)
}

/// One snapshot plus its derived status samples, encoded on demand.
#[derive(Debug)]
struct SnapshotCollector {
    snapshot: Snapshot,
    status: SampleSet,
}

impl SnapshotCollector {
    fn sets(&self) -> impl Iterator<Item = &SampleSet> {
        self.snapshot
            .families()
            .filter_map(|(_, state)| state.samples.as_deref())
            .chain(std::iter::once(&self.status))
    }
}

impl Collector for SnapshotCollector {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), fmt::Error> {
        let mut by_name: BTreeMap<&str, (Option<&str>, Vec<&Sample>)> = BTreeMap::new();
        for set in self.sets() {
            for sample in set.samples() {
                let entry = by_name.entry(sample.name.as_str()).or_default();
                entry.0 = entry.0.or_else(|| set.help(&sample.name));
                entry.1.push(sample);
            }
        }

        for (&name, (help, samples)) in &by_name {
            let mut metric_encoder =
                encoder.encode_descriptor(name, help.unwrap_or(name), None, MetricType::Gauge)?;
            for sample in samples {
                if sample.labels.is_empty() {
                    encode_value(sample.value, &mut metric_encoder)?;
                    continue;
                }
                let label_set: Vec<(&str, &str)> = sample
                    .labels
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                let mut family_encoder = metric_encoder.encode_family(&label_set)?;
                encode_value(sample.value, &mut family_encoder)?;
            }
        }
        Ok(())
    }
}

fn encode_value(value: SampleValue, encoder: &mut MetricEncoder<'_>) -> Result<(), fmt::Error> {
    match value {
        SampleValue::Integer(n) => encoder.encode_gauge(&n),
        SampleValue::Float(f) => encoder.encode_gauge(&f),
    }
}

/// Staleness and health samples derived from per-family store state.
fn status_samples(snapshot: &Snapshot) -> SampleSet {
    let mut b = SampleSetBuilder::new();
    b.describe(
        LAST_SUCCESS_AGE,
        "Seconds since the family's samples were last successfully published.",
    )
    .describe(
        LAST_ATTEMPT_TIMESTAMP,
        "Unix time of the family's last collection attempt.",
    )
    .describe(
        CONSECUTIVE_FAILURES,
        "Failed collection runs since the last successful publish.",
    )
    .describe(
        COLLECTOR_DISABLED,
        "1 if the family's collector was disabled by a configuration error.",
    );

    for (family, state) in snapshot.families() {
        let family_labels = labels([("family", family)]);

        if let Some(age) = snapshot.age_secs(family) {
            b.push(LAST_SUCCESS_AGE, family_labels.clone(), age);
        }
        if let Some(at) = state.last_attempt {
            let secs = at.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64();
            b.push(LAST_ATTEMPT_TIMESTAMP, family_labels.clone(), secs);
        }
        b.push(
            CONSECUTIVE_FAILURES,
            family_labels.clone(),
            state.consecutive_failures,
        );
        b.push(COLLECTOR_DISABLED, family_labels, state.disabled.is_some());
    }

    b.build()
}
