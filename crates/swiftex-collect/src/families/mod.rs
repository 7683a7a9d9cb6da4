//! Family definitions: which recon check each family queries and how the
//! per-node payloads become samples.
//!
//! ```text
//! Family ──endpoint()──▶ ReconEndpoint ──probe──▶ ReconPayload per node
//!                                                     │
//!                          aggregate(family, reports) ▼
//!                                               SampleSetBuilder
//! ```
//!
//! Aggregation only ever sees reports from nodes that answered with the
//! right payload variant; failed nodes are accounted for by the collector.

mod disk;
mod node;
mod replication;
mod ring;

use std::collections::BTreeMap;
use std::time::SystemTime;

use swiftex_core::{Family, Target};
use swiftex_probe::{ReconEndpoint, ReconPayload};
use swiftex_store::SampleSetBuilder;

pub use disk::{DISK_AVAIL, DISK_SIZE, DISK_TOTAL_SIZE, DISK_TOTAL_USED, DISK_USED};
pub use node::{
    ASYNC_PENDING, ASYNC_PENDING_TOTAL, NODE_LOAD, NODE_PROCESSES, QUARANTINED,
    QUARANTINED_TOTAL, UNMOUNTED,
};
pub use replication::{
    REPLICATION_AGE, REPLICATION_DURATION, REPLICATION_FAILURES, REPLICATION_LAST,
};
pub use ring::{RING_MD5_MATCH, RING_MD5_MISMATCHES, reference_hash};

/// One node's successful answer.
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub target: Target,
    pub payload: ReconPayload,
}

impl NodeReport {
    /// Label value identifying the node.
    pub fn node(&self) -> String {
        self.target.to_string()
    }
}

/// Inputs to aggregation that do not come from the nodes.
#[derive(Debug, Clone)]
pub struct AggregateContext<'a> {
    /// Wall clock used for age calculations.
    pub now: SystemTime,
    /// Configured ring hashes, keyed by ring name.
    pub expected_ring_md5: &'a BTreeMap<String, String>,
}

/// The recon check a family is built from.
pub fn endpoint(family: Family) -> ReconEndpoint {
    match family {
        Family::DiskUsage => ReconEndpoint::DiskUsage,
        Family::RingMd5 => ReconEndpoint::RingMd5,
        Family::Quarantine => ReconEndpoint::Quarantined,
        Family::AsyncPending => ReconEndpoint::AsyncPending,
        Family::Replication => ReconEndpoint::Replication,
        Family::Unmounted => ReconEndpoint::Unmounted,
        Family::Load => ReconEndpoint::Load,
    }
}

/// Turn successful node reports into the family's samples.
pub fn aggregate(
    family: Family,
    reports: &[NodeReport],
    ctx: &AggregateContext<'_>,
    out: &mut SampleSetBuilder,
) {
    match family {
        Family::DiskUsage => disk::aggregate(reports, out),
        Family::RingMd5 => ring::aggregate(reports, ctx.expected_ring_md5, out),
        Family::Quarantine => node::quarantine(reports, out),
        Family::AsyncPending => node::async_pending(reports, out),
        Family::Replication => replication::aggregate(reports, ctx.now, out),
        Family::Unmounted => node::unmounted(reports, out),
        Family::Load => node::load(reports, out),
    }
}

#[cfg(test)]
pub(crate) fn report(host: &str, endpoint: ReconEndpoint, body: &str) -> NodeReport {
    NodeReport {
        target: Target::new(host, 6000),
        payload: endpoint.decode(body.as_bytes()).unwrap(),
    }
}
