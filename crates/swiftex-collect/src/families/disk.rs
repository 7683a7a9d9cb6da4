//! `disk_usage`: per-device capacity and the cluster totals.

use swiftex_probe::ReconPayload;
use swiftex_store::{Labels, SampleSetBuilder, labels};

use super::NodeReport;

pub const DISK_USED: &str = "swift_disk_usage_bytes";
pub const DISK_SIZE: &str = "swift_disk_size_bytes";
pub const DISK_AVAIL: &str = "swift_disk_avail_bytes";
pub const DISK_TOTAL_USED: &str = "swift_cluster_disk_usage_bytes";
pub const DISK_TOTAL_SIZE: &str = "swift_cluster_disk_size_bytes";

pub(super) fn aggregate(reports: &[NodeReport], out: &mut SampleSetBuilder) {
    out.describe(DISK_USED, "Bytes used on a mounted storage device.")
        .describe(DISK_SIZE, "Capacity of a mounted storage device in bytes.")
        .describe(DISK_AVAIL, "Bytes available on a mounted storage device.")
        .describe(DISK_TOTAL_USED, "Bytes used across all reporting devices.")
        .describe(DISK_TOTAL_SIZE, "Capacity of all reporting devices in bytes.");

    let mut total_used = 0.0f64;
    let mut total_size = 0.0f64;

    for report in reports {
        let ReconPayload::DiskUsage(devices) = &report.payload else {
            continue;
        };
        let node = report.node();
        // Unmounted devices carry no counters; they show up in `unmounted`.
        for (device, usage) in devices
            .iter()
            .filter_map(|d| d.usage.map(|u| (d.device.as_str(), u)))
        {
            let l = labels([("node", node.as_str()), ("device", device)]);
            if out.push(DISK_USED, l.clone(), usage.used) {
                total_used += usage.used as f64;
                total_size += usage.size as f64;
            }
            out.push(DISK_SIZE, l.clone(), usage.size);
            out.push(DISK_AVAIL, l, usage.avail);
        }
    }

    out.push(DISK_TOTAL_USED, Labels::new(), total_used);
    out.push(DISK_TOTAL_SIZE, Labels::new(), total_size);
}
