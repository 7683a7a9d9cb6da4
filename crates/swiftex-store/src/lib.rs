//! swiftex-store: the metric store behind the scrape endpoint.
//!
//! # Architecture
//!
//! ```text
//! Collector run ──► SampleSetBuilder ──► SampleSet (immutable)
//!                                            │
//! Scheduler ── publish / record_failure ──► MetricStore (ArcSwap<map>)
//!                                            │
//! Scrape ───────────── snapshot() ─────────► Snapshot ──► render_exposition()
//! ```
//!
//! Publishing replaces a family's samples as a whole. A snapshot is one
//! atomic load, so scrapes never wait for collection and never observe a
//! half-updated family. Families that have never been published are
//! absent from the samples; their status is still reported.

pub mod error;
pub mod exposition;
pub mod sample;
pub mod store;

pub use error::{ScrapeError, ScrapeResult};
pub use exposition::{CONTENT_TYPE, render_exposition};
pub use sample::{Labels, Sample, SampleSet, SampleSetBuilder, SampleValue, labels};
pub use store::{FamilyState, MetricStore, Snapshot};
