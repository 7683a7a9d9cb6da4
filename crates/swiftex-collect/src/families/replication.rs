//! `replication`: object replicator pass duration, recency, and failures.

use std::time::{SystemTime, UNIX_EPOCH};

use swiftex_probe::ReconPayload;
use swiftex_store::{SampleSetBuilder, labels};

use super::NodeReport;

pub const REPLICATION_DURATION: &str = "swift_replication_duration_seconds";
pub const REPLICATION_LAST: &str = "swift_replication_last_timestamp_seconds";
pub const REPLICATION_AGE: &str = "swift_replication_age_seconds";
pub const REPLICATION_FAILURES: &str = "swift_replication_failures";

pub(super) fn aggregate(reports: &[NodeReport], now: SystemTime, out: &mut SampleSetBuilder) {
    out.describe(
        REPLICATION_DURATION,
        "Duration of the node's last completed replication pass.",
    )
    .describe(
        REPLICATION_LAST,
        "Unix time the node's last replication pass completed.",
    )
    .describe(
        REPLICATION_AGE,
        "Seconds since the node's last replication pass completed.",
    )
    .describe(
        REPLICATION_FAILURES,
        "Failures reported by the node's last replication pass.",
    );

    let now_secs = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64();

    for report in reports {
        let ReconPayload::Replication(r) = &report.payload else {
            continue;
        };
        let node = report.node();
        // Recon reports the pass duration in minutes.
        out.push(
            REPLICATION_DURATION,
            labels([("node", node.as_str())]),
            r.duration_minutes * 60.0,
        );
        out.push(
            REPLICATION_LAST,
            labels([("node", node.as_str())]),
            r.last_completed,
        );
        // Node clocks may run ahead of ours.
        out.push(
            REPLICATION_AGE,
            labels([("node", node.as_str())]),
            (now_secs - r.last_completed).max(0.0),
        );
        if let Some(failures) = r.failures {
            out.push(REPLICATION_FAILURES, labels([("node", node)]), failures);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::report;
    use std::time::Duration;
    use swiftex_probe::ReconEndpoint;
    use swiftex_store::SampleValue;

    #[test]
    fn durations_and_age() {
        let now = UNIX_EPOCH + Duration::from_secs(1_700_000_100);
        let reports = vec![
            report(
                "s1",
                ReconEndpoint::Replication,
                r#"{"object_replication_time":1.5,"object_replication_last":1700000000.0,
                   "replication_stats":{"failure":4}}"#,
            ),
            report(
                "s2",
                ReconEndpoint::Replication,
                r#"{"object_replication_time":0.5,"object_replication_last":1700000200.0}"#,
            ),
        ];
        let mut b = SampleSetBuilder::new();
        aggregate(&reports, now, &mut b);
        let set = b.build();

        let s1 = labels([("node", "s1:6000")]);
        let s2 = labels([("node", "s2:6000")]);
        assert_eq!(
            set.value(REPLICATION_DURATION, &s1),
            Some(SampleValue::Float(90.0))
        );
        assert_eq!(
            set.value(REPLICATION_AGE, &s1),
            Some(SampleValue::Float(100.0))
        );
        assert_eq!(
            set.value(REPLICATION_FAILURES, &s1),
            Some(SampleValue::Integer(4))
        );
        // Clock skew clamps to zero; no stats means no failure sample.
        assert_eq!(set.value(REPLICATION_AGE, &s2), Some(SampleValue::Float(0.0)));
        assert_eq!(set.value(REPLICATION_FAILURES, &s2), None);
    }
}
