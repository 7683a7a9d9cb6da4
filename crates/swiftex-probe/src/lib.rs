//! swiftex-probe: recon queries against Swift storage nodes.
//!
//! # Architecture
//!
//! ```text
//! ReconProbe (trait)
//!   └── HttpReconClient
//!       ├── GET http://<node>/recon/<check>   (bounded by timeout)
//!       └── ReconEndpoint::decode() → ReconPayload (typed variant)
//!
//! ProbeError
//!   Connection | Timeout | Status | Malformed | Validation
//! ```
//!
//! Failures are returned, never raised: the collector decides whether a
//! failed node is retried, counted, or ignored.

pub mod client;
pub mod error;
pub mod payload;

pub use client::{HttpReconClient, ProbeFuture, ReconProbe};
pub use error::{ProbeError, ProbeResult};
pub use payload::{
    AsyncPendingReport, DeviceBytes, DeviceUsage, LoadReport, QuarantineReport, ReconEndpoint,
    ReconPayload, ReplicationReport, RingMd5Report,
};
