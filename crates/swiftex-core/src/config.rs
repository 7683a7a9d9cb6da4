//! swiftex.toml configuration parser.
//!
//! The file is read once at startup and turned into an immutable
//! [`ExporterConfig`]. Every value is validated here so that collectors can
//! assume well-formed settings for their whole lifetime.

use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{DEFAULT_RECON_PORT, Family, Target};

static RING_MD5_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{32}$").expect("md5 regex"));

static RING_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9_\-]*$").expect("ring name regex"));

// ── File schema ────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    defaults: DefaultsSection,
    discovery: DiscoverySection,
    #[serde(default, rename = "collector")]
    collectors: Vec<CollectorSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerSection {
    listen: Option<String>,
    metrics_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefaultsSection {
    interval: Option<String>,
    probe_timeout: Option<String>,
    run_ceiling: Option<String>,
    concurrency: Option<usize>,
    retries: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct DiscoverySection {
    nodes: Option<Vec<String>>,
    file: Option<PathBuf>,
    default_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct CollectorSection {
    family: String,
    interval: Option<String>,
    probe_timeout: Option<String>,
    run_ceiling: Option<String>,
    concurrency: Option<usize>,
    retries: Option<u32>,
    #[serde(default)]
    expected_ring_md5: BTreeMap<String, String>,
}

// ── Validated config ───────────────────────────────────────────────

/// Fully validated exporter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ExporterConfig {
    pub server: ServerConfig,
    pub discovery: DiscoveryConfig,
    /// One entry per enabled family, in start order.
    pub collectors: Vec<CollectorConfig>,
}

/// Scrape endpoint settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub metrics_path: String,
}

/// Where the list of storage nodes comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryConfig {
    /// A fixed list from the config file.
    Static(Vec<Target>),
    /// A node list file re-read before every collector run.
    File { path: PathBuf, default_port: u16 },
}

/// Settings for one collector, immutable for its lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    pub family: Family,
    /// Time between the starts of consecutive runs.
    pub interval: Duration,
    /// Upper bound for a single probe attempt.
    pub probe_timeout: Duration,
    /// Upper bound for a whole run, retries included.
    pub run_ceiling: Duration,
    /// Maximum probes in flight per run.
    pub concurrency: usize,
    /// Extra attempts for a target after a transient failure.
    pub retries: u32,
    /// Expected ring hashes by ring name (`object`, `container-1`, ...).
    pub expected_ring_md5: BTreeMap<String, String>,
}

/// Built-in defaults used when neither `[defaults]` nor a collector table
/// overrides a setting.
pub mod defaults {
    use std::time::Duration;

    pub const LISTEN: &str = "0.0.0.0:9150";
    pub const METRICS_PATH: &str = "/metrics";
    pub const INTERVAL: Duration = Duration::from_secs(60);
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
    pub const RUN_CEILING: Duration = Duration::from_secs(30);
    pub const CONCURRENCY: usize = 16;
    pub const RETRIES: u32 = 0;

    /// Largest accepted `interval`.
    pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 3600);
    /// Largest accepted `run_ceiling`; also bounds `probe_timeout`.
    pub const MAX_RUN_CEILING: Duration = Duration::from_secs(24 * 3600);
    /// Largest accepted `concurrency`.
    pub const MAX_CONCURRENCY: usize = 1024;
}

impl ExporterConfig {
    /// Read and validate a config file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate config text.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let file: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::validate(file)
    }

    /// Look up the collector settings for a family, if it is enabled.
    pub fn collector(&self, family: Family) -> Option<&CollectorConfig> {
        self.collectors.iter().find(|c| c.family == family)
    }

    fn validate(file: FileConfig) -> ConfigResult<Self> {
        let server = validate_server(&file.server)?;
        let discovery = validate_discovery(&file.discovery)?;

        let base = CollectorConfig {
            family: Family::DiskUsage,
            interval: duration_field("defaults.interval", file.defaults.interval.as_deref(), defaults::INTERVAL)?,
            probe_timeout: duration_field(
                "defaults.probe_timeout",
                file.defaults.probe_timeout.as_deref(),
                defaults::PROBE_TIMEOUT,
            )?,
            run_ceiling: duration_field(
                "defaults.run_ceiling",
                file.defaults.run_ceiling.as_deref(),
                defaults::RUN_CEILING,
            )?,
            concurrency: file.defaults.concurrency.unwrap_or(defaults::CONCURRENCY),
            retries: file.defaults.retries.unwrap_or(defaults::RETRIES),
            expected_ring_md5: BTreeMap::new(),
        };

        let collectors = if file.collectors.is_empty() {
            // No explicit tables: every family runs with the defaults.
            Family::ALL
                .into_iter()
                .map(|family| {
                    let c = CollectorConfig {
                        family,
                        ..base.clone()
                    };
                    check_collector(&c).map(|()| c)
                })
                .collect::<ConfigResult<Vec<_>>>()?
        } else {
            let mut seen = HashSet::new();
            let mut out = Vec::with_capacity(file.collectors.len());
            for section in &file.collectors {
                let family: Family = section.family.parse()?;
                if !seen.insert(family) {
                    return Err(ConfigError::DuplicateFamily(section.family.clone()));
                }
                let c = merge_collector(family, section, &base)?;
                check_collector(&c)?;
                out.push(c);
            }
            out
        };

        Ok(Self {
            server,
            discovery,
            collectors,
        })
    }
}

fn validate_server(section: &ServerSection) -> ConfigResult<ServerConfig> {
    let listen_raw = section.listen.as_deref().unwrap_or(defaults::LISTEN);
    let listen: SocketAddr = listen_raw.parse().map_err(|_| ConfigError::InvalidValue {
        field: "server.listen".to_string(),
        reason: format!("{listen_raw:?} is not a socket address"),
    })?;

    let metrics_path = section
        .metrics_path
        .clone()
        .unwrap_or_else(|| defaults::METRICS_PATH.to_string());
    if !metrics_path.starts_with('/') || metrics_path.len() < 2 {
        return Err(ConfigError::InvalidValue {
            field: "server.metrics_path".to_string(),
            reason: "must start with '/' and name a path".to_string(),
        });
    }
    if metrics_path == "/healthz" || metrics_path.contains(['{', '}', '*']) {
        return Err(ConfigError::InvalidValue {
            field: "server.metrics_path".to_string(),
            reason: format!("{metrics_path:?} clashes with a built-in route"),
        });
    }

    Ok(ServerConfig {
        listen,
        metrics_path,
    })
}

fn validate_discovery(section: &DiscoverySection) -> ConfigResult<DiscoveryConfig> {
    let default_port = section.default_port.unwrap_or(DEFAULT_RECON_PORT);
    if default_port == 0 {
        return Err(ConfigError::InvalidValue {
            field: "discovery.default_port".to_string(),
            reason: "must be non-zero".to_string(),
        });
    }

    match (&section.nodes, &section.file) {
        (Some(nodes), None) => {
            let targets = parse_target_list(nodes.iter().map(String::as_str), default_port)?;
            Ok(DiscoveryConfig::Static(targets))
        }
        (None, Some(path)) => Ok(DiscoveryConfig::File {
            path: path.clone(),
            default_port,
        }),
        _ => Err(ConfigError::InvalidValue {
            field: "discovery".to_string(),
            reason: "exactly one of `nodes` or `file` must be set".to_string(),
        }),
    }
}

/// Parse a list of node entries, rejecting the whole list on the first bad
/// entry. Duplicates are dropped while keeping first-seen order.
pub fn parse_target_list<'a>(
    entries: impl IntoIterator<Item = &'a str>,
    default_port: u16,
) -> ConfigResult<Vec<Target>> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for entry in entries {
        let target = Target::parse(entry, default_port)?;
        if seen.insert(target.clone()) {
            targets.push(target);
        }
    }
    Ok(targets)
}

fn merge_collector(
    family: Family,
    section: &CollectorSection,
    base: &CollectorConfig,
) -> ConfigResult<CollectorConfig> {
    let field = |name: &str| format!("collector.{family}.{name}");

    let expected_ring_md5 = section
        .expected_ring_md5
        .iter()
        .map(|(ring, hash)| {
            let hash = hash.to_ascii_lowercase();
            if !RING_NAME_RE.is_match(ring) {
                return Err(ConfigError::InvalidValue {
                    field: field("expected_ring_md5"),
                    reason: format!("{ring:?} is not a ring name"),
                });
            }
            if !RING_MD5_RE.is_match(&hash) {
                return Err(ConfigError::InvalidValue {
                    field: field("expected_ring_md5"),
                    reason: format!("{hash:?} is not an md5 hex digest"),
                });
            }
            Ok((ring.clone(), hash))
        })
        .collect::<ConfigResult<BTreeMap<_, _>>>()?;

    if !expected_ring_md5.is_empty() && family != Family::RingMd5 {
        return Err(ConfigError::InvalidValue {
            field: field("expected_ring_md5"),
            reason: "only valid for the ring_md5 family".to_string(),
        });
    }

    Ok(CollectorConfig {
        family,
        interval: duration_field(&field("interval"), section.interval.as_deref(), base.interval)?,
        probe_timeout: duration_field(
            &field("probe_timeout"),
            section.probe_timeout.as_deref(),
            base.probe_timeout,
        )?,
        run_ceiling: duration_field(
            &field("run_ceiling"),
            section.run_ceiling.as_deref(),
            base.run_ceiling,
        )?,
        concurrency: section.concurrency.unwrap_or(base.concurrency),
        retries: section.retries.unwrap_or(base.retries),
        expected_ring_md5,
    })
}

fn check_collector(c: &CollectorConfig) -> ConfigResult<()> {
    let invalid = |name: &str, reason: &str| ConfigError::InvalidValue {
        field: format!("collector.{}.{name}", c.family),
        reason: reason.to_string(),
    };

    if c.interval.is_zero() {
        return Err(invalid("interval", "must be non-zero"));
    }
    if c.interval > defaults::MAX_INTERVAL {
        return Err(invalid("interval", "must be at most 24h"));
    }
    if c.probe_timeout.is_zero() {
        return Err(invalid("probe_timeout", "must be non-zero"));
    }
    if c.run_ceiling < c.probe_timeout {
        return Err(invalid("run_ceiling", "must be at least probe_timeout"));
    }
    if c.run_ceiling > defaults::MAX_RUN_CEILING {
        return Err(invalid("run_ceiling", "must be at most 24h"));
    }
    if c.concurrency == 0 {
        return Err(invalid("concurrency", "must be at least 1"));
    }
    if c.concurrency > defaults::MAX_CONCURRENCY {
        return Err(invalid("concurrency", "must be at most 1024"));
    }
    Ok(())
}

fn duration_field(field: &str, value: Option<&str>, default: Duration) -> ConfigResult<Duration> {
    match value {
        None => Ok(default),
        Some(raw) => parse_duration(raw).ok_or_else(|| ConfigError::InvalidDuration {
            field: field.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// Parse a duration string like "500ms", "5s", "2m", "1h", or a bare number
/// of seconds. Values that overflow `Duration` are rejected.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok()?.checked_mul(60).map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        hours.parse::<u64>().ok()?.checked_mul(3600).map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
