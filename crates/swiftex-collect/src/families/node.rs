//! Per-node counter families: `quarantine`, `async_pending`, `unmounted`
//! and `load`.

use swiftex_probe::ReconPayload;
use swiftex_store::{Labels, SampleSetBuilder, labels};

use super::NodeReport;

pub const QUARANTINED: &str = "swift_quarantined_items";
pub const QUARANTINED_TOTAL: &str = "swift_cluster_quarantined_items";
pub const ASYNC_PENDING: &str = "swift_async_pending";
pub const ASYNC_PENDING_TOTAL: &str = "swift_async_pending_total";
pub const UNMOUNTED: &str = "swift_unmounted_devices";
pub const NODE_LOAD: &str = "swift_node_load";
pub const NODE_PROCESSES: &str = "swift_node_processes";

pub(super) fn quarantine(reports: &[NodeReport], out: &mut SampleSetBuilder) {
    out.describe(QUARANTINED, "Items moved to quarantine on the node.")
        .describe(QUARANTINED_TOTAL, "Quarantined items across all reporting nodes.");

    let mut totals = [0.0f64; 3];
    for report in reports {
        let ReconPayload::Quarantined(q) = &report.payload else {
            continue;
        };
        let node = report.node();
        for (i, (kind, count)) in [
            ("objects", q.objects),
            ("accounts", q.accounts),
            ("containers", q.containers),
        ]
        .into_iter()
        .enumerate()
        {
            if out.push(QUARANTINED, labels([("node", node.as_str()), ("type", kind)]), count) {
                totals[i] += count as f64;
            }
        }
    }

    for (kind, total) in ["objects", "accounts", "containers"].into_iter().zip(totals) {
        out.push(QUARANTINED_TOTAL, labels([("type", kind)]), total);
    }
}

pub(super) fn async_pending(reports: &[NodeReport], out: &mut SampleSetBuilder) {
    out.describe(ASYNC_PENDING, "Container updates queued for later on the node.")
        .describe(ASYNC_PENDING_TOTAL, "Queued container updates across all reporting nodes.");

    let mut total = 0.0f64;
    for report in reports {
        let ReconPayload::AsyncPending(a) = &report.payload else {
            continue;
        };
        if out.push(ASYNC_PENDING, labels([("node", report.node())]), a.pending) {
            total += a.pending as f64;
        }
    }
    out.push(ASYNC_PENDING_TOTAL, Labels::new(), total);
}

pub(super) fn unmounted(reports: &[NodeReport], out: &mut SampleSetBuilder) {
    out.describe(UNMOUNTED, "Devices the node reports as not mounted.");

    for report in reports {
        let ReconPayload::Unmounted(devices) = &report.payload else {
            continue;
        };
        out.push(UNMOUNTED, labels([("node", report.node())]), devices.len());
    }
}

pub(super) fn load(reports: &[NodeReport], out: &mut SampleSetBuilder) {
    out.describe(NODE_LOAD, "Load average of the node.")
        .describe(NODE_PROCESSES, "Running processes on the node.");

    for report in reports {
        let ReconPayload::Load(l) = &report.payload else {
            continue;
        };
        let node = report.node();
        for (window, value) in [("1m", l.load_1m), ("5m", l.load_5m), ("15m", l.load_15m)] {
            out.push(
                NODE_LOAD,
                labels([("node", node.as_str()), ("window", window)]),
                value,
            );
        }
        out.push(NODE_PROCESSES, labels([("node", node)]), l.processes);
    }
}
