//! Collection error types.

use swiftex_core::{ConfigError, Family};
use thiserror::Error;

/// Result type alias for collector runs.
pub type CollectResult<T> = Result<T, CollectError>;

/// Why a collector run produced no sample set.
#[derive(Debug, Error)]
pub enum CollectError {
    /// No target produced usable data. The previously published samples
    /// stay in place; the next interval retries.
    #[error("{family}: all {failed} of {total} targets failed")]
    RunFailed {
        family: Family,
        failed: usize,
        total: usize,
    },

    /// The collector cannot work with its inputs. It is disabled for the
    /// rest of the process lifetime.
    #[error("{family}: configuration error: {reason}")]
    Configuration { family: Family, reason: String },
}

/// Why a discovery source could not produce a target list.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The source produced a list that contains an invalid entry.
    #[error("malformed target list: {0}")]
    Malformed(#[from] ConfigError),

    /// The source could not be read and has no earlier list to fall back on.
    #[error("target list unavailable: {0}")]
    Unavailable(String),
}
