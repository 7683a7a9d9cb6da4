//! Probe failure taxonomy.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for a single probe.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Why a single probe against one node failed.
///
/// Every variant is recoverable: the collector logs it, counts it, and
/// leaves the node out of that run's samples.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbeError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("payload failed validation: {0}")]
    Validation(String),
}

impl ProbeError {
    /// Whether another attempt has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProbeError::Connection(_) | ProbeError::Timeout(_))
    }

    /// Stable snake_case label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Connection(_) => "connection",
            ProbeError::Timeout(_) => "timeout",
            ProbeError::Status(_) => "status",
            ProbeError::Malformed(_) => "malformed",
            ProbeError::Validation(_) => "validation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_failures_are_transient() {
        assert!(ProbeError::Connection("refused".into()).is_transient());
        assert!(ProbeError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!ProbeError::Status(503).is_transient());
        assert!(!ProbeError::Malformed("eof".into()).is_transient());
        assert!(!ProbeError::Validation("negative".into()).is_transient());
    }

    #[test]
    fn kinds_are_distinct() {
        let kinds = [
            ProbeError::Connection(String::new()).kind(),
            ProbeError::Timeout(Duration::ZERO).kind(),
            ProbeError::Status(500).kind(),
            ProbeError::Malformed(String::new()).kind(),
            ProbeError::Validation(String::new()).kind(),
        ];
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }
}
