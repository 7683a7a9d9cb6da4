//! `ring_md5`: ring file consistency across nodes.
//!
//! Each node's hash of a ring is compared against a reference hash: the
//! configured one when present, otherwise the hash most nodes agree on
//! (ties go to the lexically smallest hash so runs are deterministic).

use std::collections::BTreeMap;

use swiftex_probe::ReconPayload;
use swiftex_store::{SampleSetBuilder, labels};

use super::NodeReport;

pub const RING_MD5_MATCH: &str = "swift_ring_md5_match";
pub const RING_MD5_MISMATCHES: &str = "swift_ring_md5_mismatches";

pub(super) fn aggregate(
    reports: &[NodeReport],
    expected: &BTreeMap<String, String>,
    out: &mut SampleSetBuilder,
) {
    out.describe(
        RING_MD5_MATCH,
        "1 if the node's ring file matches the reference hash.",
    )
    .describe(
        RING_MD5_MISMATCHES,
        "Reporting nodes whose ring file differs from the reference hash.",
    );

    // ring name → [(node, hash)]
    let mut rings: BTreeMap<&str, Vec<(String, Option<&str>)>> = BTreeMap::new();
    for report in reports {
        let ReconPayload::RingMd5(ring_report) = &report.payload else {
            continue;
        };
        let node = report.node();
        for (ring, hash) in &ring_report.rings {
            rings
                .entry(ring.as_str())
                .or_default()
                .push((node.clone(), hash.as_deref()));
        }
    }

    for (ring, nodes) in &rings {
        let reference = match expected.get(*ring) {
            Some(hash) => Some(hash.as_str()),
            None => reference_hash(nodes.iter().filter_map(|(_, h)| *h)),
        };

        let mut mismatches = 0u64;
        for (node, hash) in nodes {
            let matches = reference.is_some() && *hash == reference;
            if !matches {
                mismatches += 1;
            }
            out.push(
                RING_MD5_MATCH,
                labels([("node", node.as_str()), ("ring", *ring)]),
                matches,
            );
        }
        out.push(RING_MD5_MISMATCHES, labels([("ring", *ring)]), mismatches);
    }
}

/// The most common hash; ties resolve to the smallest hash.
pub fn reference_hash<'a>(hashes: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for hash in hashes {
        *counts.entry(hash).or_default() += 1;
    }
    // BTreeMap iterates in ascending order and `max_by_key` keeps the last
    // maximum, so walk it backwards to keep the smallest hash on ties.
    counts
        .into_iter()
        .rev()
        .max_by_key(|(_, count)| *count)
        .map(|(hash, _)| hash)
}
