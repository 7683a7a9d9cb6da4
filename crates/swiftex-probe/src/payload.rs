//! Recon endpoints and their typed payloads.
//!
//! Each recon check has a distinct [`ReconPayload`] variant with explicit
//! required fields. Decoding happens in two steps: serde turns the body
//! into a raw shape (any mismatch is [`ProbeError::Malformed`]), then the
//! raw shape is checked against domain rules (any violation is
//! [`ProbeError::Validation`]). A payload is never partially accepted.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{ProbeError, ProbeResult};

/// A recon check exposed by every storage node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconEndpoint {
    DiskUsage,
    RingMd5,
    Quarantined,
    AsyncPending,
    Replication,
    Unmounted,
    Load,
}

impl ReconEndpoint {
    /// Request path on the node's recon listener.
    pub fn path(&self) -> &'static str {
        match self {
            ReconEndpoint::DiskUsage => "/recon/diskusage",
            ReconEndpoint::RingMd5 => "/recon/ringmd5",
            ReconEndpoint::Quarantined => "/recon/quarantined",
            ReconEndpoint::AsyncPending => "/recon/async",
            ReconEndpoint::Replication => "/recon/replication/object",
            ReconEndpoint::Unmounted => "/recon/unmounted",
            ReconEndpoint::Load => "/recon/load",
        }
    }

    /// Decode a response body into this endpoint's payload variant.
    pub fn decode(&self, body: &[u8]) -> ProbeResult<ReconPayload> {
        match self {
            ReconEndpoint::DiskUsage => {
                let raw: Vec<RawDevice> = from_json(body)?;
                let devices = raw
                    .into_iter()
                    .map(DeviceUsage::try_from)
                    .collect::<ProbeResult<Vec<_>>>()?;
                Ok(ReconPayload::DiskUsage(devices))
            }
            ReconEndpoint::RingMd5 => {
                let raw: BTreeMap<String, Option<String>> = from_json(body)?;
                Ok(ReconPayload::RingMd5(RingMd5Report::try_from(raw)?))
            }
            ReconEndpoint::Quarantined => {
                let raw: RawQuarantine = from_json(body)?;
                Ok(ReconPayload::Quarantined(QuarantineReport::try_from(raw)?))
            }
            ReconEndpoint::AsyncPending => {
                let raw: RawAsync = from_json(body)?;
                let pending = raw
                    .async_pending
                    .ok_or_else(|| invalid("async_pending not reported"))?;
                Ok(ReconPayload::AsyncPending(AsyncPendingReport {
                    pending: non_negative("async_pending", pending)?,
                }))
            }
            ReconEndpoint::Replication => {
                let raw: RawReplication = from_json(body)?;
                Ok(ReconPayload::Replication(ReplicationReport::try_from(raw)?))
            }
            ReconEndpoint::Unmounted => {
                let raw: Vec<RawUnmounted> = from_json(body)?;
                let devices = raw
                    .into_iter()
                    .map(|d| {
                        if d.device.trim().is_empty() {
                            Err(invalid("unmounted entry with empty device name"))
                        } else {
                            Ok(d.device)
                        }
                    })
                    .collect::<ProbeResult<Vec<_>>>()?;
                Ok(ReconPayload::Unmounted(devices))
            }
            ReconEndpoint::Load => {
                let raw: RawLoad = from_json(body)?;
                Ok(ReconPayload::Load(LoadReport::try_from(raw)?))
            }
        }
    }
}

impl fmt::Display for ReconEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A validated recon response.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconPayload {
    DiskUsage(Vec<DeviceUsage>),
    RingMd5(RingMd5Report),
    Quarantined(QuarantineReport),
    AsyncPending(AsyncPendingReport),
    Replication(ReplicationReport),
    /// Names of devices the node reports as not mounted.
    Unmounted(Vec<String>),
    Load(LoadReport),
}

impl ReconPayload {
    /// The endpoint this payload was decoded from.
    pub fn endpoint(&self) -> ReconEndpoint {
        match self {
            ReconPayload::DiskUsage(_) => ReconEndpoint::DiskUsage,
            ReconPayload::RingMd5(_) => ReconEndpoint::RingMd5,
            ReconPayload::Quarantined(_) => ReconEndpoint::Quarantined,
            ReconPayload::AsyncPending(_) => ReconEndpoint::AsyncPending,
            ReconPayload::Replication(_) => ReconEndpoint::Replication,
            ReconPayload::Unmounted(_) => ReconEndpoint::Unmounted,
            ReconPayload::Load(_) => ReconEndpoint::Load,
        }
    }
}

// ── Disk usage ─────────────────────────────────────────────────────

/// One device line from `/recon/diskusage`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUsage {
    pub device: String,
    /// Byte counters, present only for mounted devices.
    pub usage: Option<DeviceBytes>,
}

/// Byte counters for a mounted device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceBytes {
    pub size: u64,
    pub used: u64,
    pub avail: u64,
}

#[derive(Deserialize)]
struct RawDevice {
    device: String,
    mounted: RawMounted,
    size: RawBytes,
    used: RawBytes,
    avail: RawBytes,
}

/// Recon reports an error string instead of `false` when the mount check
/// itself failed.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawMounted {
    Flag(bool),
    Error(String),
}

/// Unmounted devices report `""` for every counter.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytes {
    Count(i64),
    Blank(String),
}

impl TryFrom<RawDevice> for DeviceUsage {
    type Error = ProbeError;

    fn try_from(raw: RawDevice) -> ProbeResult<Self> {
        if raw.device.trim().is_empty() {
            return Err(invalid("device entry with empty name"));
        }

        let mounted = matches!(raw.mounted, RawMounted::Flag(true));
        if !mounted {
            return Ok(DeviceUsage {
                device: raw.device,
                usage: None,
            });
        }

        let count = |field: &str, value: RawBytes| match value {
            RawBytes::Count(n) => non_negative(field, n),
            RawBytes::Blank(_) => Err(invalid(format!(
                "mounted device {} has no {field} counter",
                raw.device
            ))),
        };
        let size = count("size", raw.size)?;
        let used = count("used", raw.used)?;
        let avail = count("avail", raw.avail)?;

        if used > size {
            return Err(invalid(format!(
                "device {} reports used {used} > size {size}",
                raw.device
            )));
        }

        Ok(DeviceUsage {
            device: raw.device,
            usage: Some(DeviceBytes { size, used, avail }),
        })
    }
}

// ── Ring md5 ───────────────────────────────────────────────────────

/// Ring file hashes from `/recon/ringmd5`, keyed by ring name.
///
/// Ring names are the file basename without `.ring.gz` (`object`,
/// `object-1`, `container`, ...). `None` means the node has no such file.
#[derive(Debug, Clone, PartialEq)]
pub struct RingMd5Report {
    pub rings: BTreeMap<String, Option<String>>,
}

impl TryFrom<BTreeMap<String, Option<String>>> for RingMd5Report {
    type Error = ProbeError;

    fn try_from(raw: BTreeMap<String, Option<String>>) -> ProbeResult<Self> {
        let mut rings = BTreeMap::new();
        for (path, hash) in raw {
            let name = ring_name(&path)
                .ok_or_else(|| invalid(format!("{path:?} is not a ring file path")))?;
            let hash = match hash {
                Some(h) => {
                    let h = h.to_ascii_lowercase();
                    if h.len() != 32 || !h.bytes().all(|b| b.is_ascii_hexdigit()) {
                        return Err(invalid(format!("ring {name} has non-md5 hash {h:?}")));
                    }
                    Some(h)
                }
                None => None,
            };
            rings.insert(name, hash);
        }
        Ok(RingMd5Report { rings })
    }
}

/// `/etc/swift/object-1.ring.gz` → `object-1`.
pub fn ring_name(path: &str) -> Option<String> {
    let file = path.rsplit('/').next()?;
    let name = file.strip_suffix(".ring.gz")?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

// ── Quarantine ─────────────────────────────────────────────────────

/// Quarantined item counts from `/recon/quarantined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuarantineReport {
    pub objects: u64,
    pub accounts: u64,
    pub containers: u64,
}

#[derive(Deserialize)]
struct RawQuarantine {
    objects: i64,
    accounts: i64,
    containers: i64,
}

impl TryFrom<RawQuarantine> for QuarantineReport {
    type Error = ProbeError;

    fn try_from(raw: RawQuarantine) -> ProbeResult<Self> {
        Ok(QuarantineReport {
            objects: non_negative("objects", raw.objects)?,
            accounts: non_negative("accounts", raw.accounts)?,
            containers: non_negative("containers", raw.containers)?,
        })
    }
}

// ── Async pending ──────────────────────────────────────────────────

/// Pending async container updates from `/recon/async`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncPendingReport {
    pub pending: u64,
}

#[derive(Deserialize)]
struct RawAsync {
    async_pending: Option<i64>,
}

// ── Replication ────────────────────────────────────────────────────

/// Object replicator status from `/recon/replication/object`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplicationReport {
    /// Duration of the last full pass, in minutes as reported by Swift.
    pub duration_minutes: f64,
    /// Unix timestamp of the last completed pass.
    pub last_completed: f64,
    /// Failed partitions in the last pass, if stats were reported.
    pub failures: Option<u64>,
}

#[derive(Deserialize)]
struct RawReplication {
    #[serde(default)]
    object_replication_time: Option<f64>,
    #[serde(default)]
    object_replication_last: Option<f64>,
    #[serde(default)]
    replication_time: Option<f64>,
    #[serde(default)]
    replication_last: Option<f64>,
    #[serde(default)]
    replication_stats: Option<RawReplicationStats>,
}

#[derive(Deserialize)]
struct RawReplicationStats {
    #[serde(default)]
    failure: Option<i64>,
}

impl TryFrom<RawReplication> for ReplicationReport {
    type Error = ProbeError;

    fn try_from(raw: RawReplication) -> ProbeResult<Self> {
        // Newer object servers report the object_ prefixed keys.
        let duration = raw
            .object_replication_time
            .or(raw.replication_time)
            .ok_or_else(|| invalid("replicator has not completed a pass"))?;
        let last = raw
            .object_replication_last
            .or(raw.replication_last)
            .ok_or_else(|| invalid("replicator has not completed a pass"))?;

        let duration_minutes = finite_non_negative("replication_time", duration)?;
        let last_completed = finite_non_negative("replication_last", last)?;
        let failures = match raw.replication_stats.and_then(|s| s.failure) {
            Some(n) => Some(non_negative("replication_stats.failure", n)?),
            None => None,
        };

        Ok(ReplicationReport {
            duration_minutes,
            last_completed,
            failures,
        })
    }
}

// ── Unmounted ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawUnmounted {
    device: String,
}

// ── Load ───────────────────────────────────────────────────────────

/// Load averages and process count from `/recon/load`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadReport {
    pub load_1m: f64,
    pub load_5m: f64,
    pub load_15m: f64,
    pub processes: u64,
}

#[derive(Deserialize)]
struct RawLoad {
    #[serde(rename = "1m")]
    one: f64,
    #[serde(rename = "5m")]
    five: f64,
    #[serde(rename = "15m")]
    fifteen: f64,
    processes: i64,
}

impl TryFrom<RawLoad> for LoadReport {
    type Error = ProbeError;

    fn try_from(raw: RawLoad) -> ProbeResult<Self> {
        Ok(LoadReport {
            load_1m: finite_non_negative("1m", raw.one)?,
            load_5m: finite_non_negative("5m", raw.five)?,
            load_15m: finite_non_negative("15m", raw.fifteen)?,
            processes: non_negative("processes", raw.processes)?,
        })
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn from_json<T: DeserializeOwned>(body: &[u8]) -> ProbeResult<T> {
    serde_json::from_slice(body).map_err(|e| ProbeError::Malformed(e.to_string()))
}

fn invalid(reason: impl Into<String>) -> ProbeError {
    ProbeError::Validation(reason.into())
}

fn non_negative(field: &str, value: i64) -> ProbeResult<u64> {
    u64::try_from(value).map_err(|_| invalid(format!("{field} is negative ({value})")))
}

fn finite_non_negative(field: &str, value: f64) -> ProbeResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(invalid(format!("{field} is not a non-negative number ({value})")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_usage_mounted_and_unmounted() {
        let body = br#"[
            {"device": "sdb1", "mounted": true, "size": 1000, "used": 400, "avail": 600},
            {"device": "sdc1", "mounted": false, "size": "", "used": "", "avail": ""},
            {"device": "sdd1", "mounted": "[Errno 5] Input/output error", "size": "", "used": "", "avail": ""}
        ]"#;
        let payload = ReconEndpoint::DiskUsage.decode(body).unwrap();
        let ReconPayload::DiskUsage(devices) = payload else {
            panic!("wrong variant");
        };
        assert_eq!(devices.len(), 3);
        assert_eq!(
            devices[0].usage,
            Some(DeviceBytes {
                size: 1000,
                used: 400,
                avail: 600
            })
        );
        assert!(devices[1].usage.is_none());
        assert!(devices[2].usage.is_none());
    }

    #[test]
    fn disk_usage_missing_field_is_malformed() {
        let body = br#"[{"device": "sdb1", "mounted": true, "size": 1000, "used": 400}]"#;
        assert!(matches!(
            ReconEndpoint::DiskUsage.decode(body),
            Err(ProbeError::Malformed(_))
        ));
    }

    #[test]
    fn disk_usage_used_over_size_is_invalid() {
        let body = br#"[{"device": "sdb1", "mounted": true, "size": 10, "used": 40, "avail": 0}]"#;
        assert!(matches!(
            ReconEndpoint::DiskUsage.decode(body),
            Err(ProbeError::Validation(_))
        ));
    }

    #[test]
    fn one_bad_device_rejects_whole_payload() {
        let body = br#"[
            {"device": "sdb1", "mounted": true, "size": 1000, "used": 400, "avail": 600},
            {"device": "sdc1", "mounted": true, "size": "", "used": "", "avail": ""}
        ]"#;
        assert!(ReconEndpoint::DiskUsage.decode(body).is_err());
    }

    #[test]
    fn ring_md5_names_and_hashes() {
        let body = br#"{
            "/etc/swift/object.ring.gz": "D41D8CD98F00B204E9800998ECF8427E",
            "/etc/swift/object-1.ring.gz": null
        }"#;
        let ReconPayload::RingMd5(report) = ReconEndpoint::RingMd5.decode(body).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(
            report.rings.get("object").cloned().flatten().as_deref(),
            Some("d41d8cd98f00b204e9800998ecf8427e")
        );
        assert_eq!(report.rings.get("object-1"), Some(&None));
    }

    #[test]
    fn ring_md5_rejects_bad_hash() {
        let body = br#"{"/etc/swift/object.ring.gz": "not-a-hash"}"#;
        assert!(matches!(
            ReconEndpoint::RingMd5.decode(body),
            Err(ProbeError::Validation(_))
        ));
        let body = br#"{"/etc/swift/swift.conf": "d41d8cd98f00b204e9800998ecf8427e"}"#;
        assert!(matches!(
            ReconEndpoint::RingMd5.decode(body),
            Err(ProbeError::Validation(_))
        ));
    }

    #[test]
    fn quarantine_negative_is_invalid() {
        let ok = br#"{"objects": 3, "accounts": 0, "containers": 1, "policies": {}}"#;
        assert_eq!(
            ReconEndpoint::Quarantined.decode(ok).unwrap(),
            ReconPayload::Quarantined(QuarantineReport {
                objects: 3,
                accounts: 0,
                containers: 1
            })
        );

        let bad = br#"{"objects": -1, "accounts": 0, "containers": 1}"#;
        assert!(matches!(
            ReconEndpoint::Quarantined.decode(bad),
            Err(ProbeError::Validation(_))
        ));
    }

    #[test]
    fn async_pending_null_is_invalid() {
        assert_eq!(
            ReconEndpoint::AsyncPending.decode(br#"{"async_pending": 12}"#).unwrap(),
            ReconPayload::AsyncPending(AsyncPendingReport { pending: 12 })
        );
        assert!(matches!(
            ReconEndpoint::AsyncPending.decode(br#"{"async_pending": null}"#),
            Err(ProbeError::Validation(_))
        ));
        assert!(matches!(
            ReconEndpoint::AsyncPending.decode(b"<html>"),
            Err(ProbeError::Malformed(_))
        ));
    }

    #[test]
    fn replication_prefers_object_keys() {
        let body = br#"{
            "replication_time": 9.0,
            "replication_last": 100.0,
            "object_replication_time": 2.5,
            "object_replication_last": 1357969645.25,
            "replication_stats": {"attempted": 10, "failure": 2, "success": 8}
        }"#;
        let ReconPayload::Replication(report) = ReconEndpoint::Replication.decode(body).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(report.duration_minutes, 2.5);
        assert_eq!(report.last_completed, 1357969645.25);
        assert_eq!(report.failures, Some(2));
    }

    #[test]
    fn replication_never_ran_is_invalid() {
        let body = br#"{"replication_time": null, "replication_last": null, "replication_stats": null}"#;
        assert!(matches!(
            ReconEndpoint::Replication.decode(body),
            Err(ProbeError::Validation(_))
        ));
    }

    #[test]
    fn unmounted_and_load() {
        let ReconPayload::Unmounted(devices) = ReconEndpoint::Unmounted
            .decode(br#"[{"device": "sdb1", "mounted": false}]"#)
            .unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(devices, vec!["sdb1".to_string()]);

        let body = br#"{"1m": 0.5, "5m": 0.25, "15m": 0.1, "processes": 1200, "tasks": "2/300"}"#;
        let ReconPayload::Load(load) = ReconEndpoint::Load.decode(body).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(load.load_1m, 0.5);
        assert_eq!(load.processes, 1200);
    }

    #[test]
    fn payload_reports_its_endpoint() {
        let payload = ReconEndpoint::Unmounted.decode(b"[]").unwrap();
        assert_eq!(payload.endpoint(), ReconEndpoint::Unmounted);
    }

    #[test]
    fn ring_name_parsing() {
        assert_eq!(ring_name("/etc/swift/account.ring.gz").as_deref(), Some("account"));
        assert_eq!(ring_name("object-2.ring.gz").as_deref(), Some("object-2"));
        assert_eq!(ring_name("/etc/swift/.ring.gz"), None);
        assert_eq!(ring_name("/etc/swift/object.builder"), None);
    }
}
