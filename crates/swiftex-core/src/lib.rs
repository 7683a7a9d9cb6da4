//! swiftex-core: shared types and configuration for the swiftex exporter.
//!
//! - [`Target`]: one storage node recon listener (`host:port`)
//! - [`Family`]: the fixed set of metric families the exporter publishes
//! - [`ExporterConfig`]: the validated, immutable swiftex.toml contents

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    CollectorConfig, DiscoveryConfig, ExporterConfig, ServerConfig, defaults, parse_duration,
};
pub use error::{ConfigError, ConfigResult};
pub use types::{DEFAULT_RECON_PORT, Family, Target};
