//! swiftex-collect: turns recon probes into published sample sets.
//!
//! # Architecture
//!
//! ```text
//! Scheduler
//!   └── one task per Collector (interval tick, runs never overlap)
//!         │
//!         ▼
//! Collector::run()
//!   ├── Discovery::targets()          static list or node list file
//!   ├── JoinSet + Semaphore fan-out   probe timeout, retries, run ceiling
//!   ├── families::aggregate()         NodeReports → SampleSetBuilder
//!   └── Ok(SampleSet) | RunFailed | Configuration
//!         │
//!         ▼
//! MetricStore::publish() / record_failure() / mark_disabled()
//! ```

pub mod collector;
pub mod discovery;
pub mod error;
pub mod families;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use collector::{COLLECTION_ERRORS, Collector};
pub use discovery::{Discovery, FileDiscovery, StaticDiscovery};
pub use error::{CollectError, CollectResult, DiscoveryError};
pub use scheduler::{RunOutcome, Scheduler, execute};
