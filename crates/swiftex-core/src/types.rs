//! Core domain types shared by every swiftex crate.
//!
//! A [`Target`] identifies one storage node's recon listener. A [`Family`]
//! names one metric family; each family is produced by exactly one collector.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default port of the Swift object server, which also serves recon.
pub const DEFAULT_RECON_PORT: u16 = 6000;

static HOSTNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9.\-]*[A-Za-z0-9])?$").expect("hostname regex")
});

static IPV6_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Fa-f:.]+$").expect("ipv6 regex"));

// ── Target ─────────────────────────────────────────────────────────

/// One storage node endpoint to probe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Target {
    /// Hostname, IPv4 address, or bare IPv6 address (no brackets).
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host`, `host:port`, `[v6]` or `[v6]:port`.
    ///
    /// Missing ports fall back to `default_port`.
    pub fn parse(entry: &str, default_port: u16) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidTarget {
            entry: entry.to_string(),
            reason: reason.to_string(),
        };

        let entry_trimmed = entry.trim();
        if entry_trimmed.is_empty() {
            return Err(invalid("empty entry"));
        }

        let (host, port) = if let Some(rest) = entry_trimmed.strip_prefix('[') {
            let (host, after) = rest
                .split_once(']')
                .ok_or_else(|| invalid("unterminated '[' in IPv6 address"))?;
            if !IPV6_RE.is_match(host) || !host.contains(':') {
                return Err(invalid("not an IPv6 address"));
            }
            let port = match after {
                "" => default_port,
                p => p
                    .strip_prefix(':')
                    .ok_or_else(|| invalid("expected ':' after ']'"))?
                    .parse::<u16>()
                    .map_err(|_| invalid("port is not a number in 1-65535"))?,
            };
            (host.to_string(), port)
        } else {
            let (host, port) = match entry_trimmed.rsplit_once(':') {
                Some((h, p)) => (
                    h,
                    p.parse::<u16>()
                        .map_err(|_| invalid("port is not a number in 1-65535"))?,
                ),
                None => (entry_trimmed, default_port),
            };
            if !HOSTNAME_RE.is_match(host) {
                return Err(invalid("host contains invalid characters"));
            }
            (host.to_string(), port)
        };

        if port == 0 {
            return Err(invalid("port must be non-zero"));
        }

        Ok(Self { host, port })
    }

    /// The `host:port` form used for connecting and the `Host` header.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.authority())
    }
}

// ── Family ─────────────────────────────────────────────────────────

/// A metric family: one recon check and the samples derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    DiskUsage,
    RingMd5,
    Quarantine,
    AsyncPending,
    Replication,
    Unmounted,
    Load,
}

impl Family {
    /// Every family, in the order collectors are started.
    pub const ALL: [Family; 7] = [
        Family::DiskUsage,
        Family::RingMd5,
        Family::Quarantine,
        Family::AsyncPending,
        Family::Replication,
        Family::Unmounted,
        Family::Load,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::DiskUsage => "disk_usage",
            Family::RingMd5 => "ring_md5",
            Family::Quarantine => "quarantine",
            Family::AsyncPending => "async_pending",
            Family::Replication => "replication",
            Family::Unmounted => "unmounted",
            Family::Load => "load",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Family {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Family::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownFamily(s.to_string()))
    }
}
