//! MetricStore: the latest known-good sample set per family.
//!
//! The whole store is one immutable map of immutable family entries held
//! in an [`ArcSwap`]. Writers build a new map (sharing every untouched
//! entry) and swap it in with read-copy-update; readers take a single
//! atomic load. Consequences:
//!
//! - a reader never sees a family half-replaced,
//! - a [`Snapshot`] reflects every family at one instant,
//! - neither side ever waits on a lock.
//!
//! Each family has a single writer (its scheduler task), so publishes for
//! one family are already serialized; the per-family `generation` makes
//! that ordering observable.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use arc_swap::ArcSwap;
use tracing::debug;

use crate::sample::{Sample, SampleSet};

type FamilyMap = BTreeMap<String, Arc<FamilyState>>;

/// Everything the store knows about one family.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FamilyState {
    /// The last successfully published samples, if any.
    pub samples: Option<Arc<SampleSet>>,
    /// When `samples` was published.
    pub published_at: Option<SystemTime>,
    /// When the last run finished, successful or not.
    pub last_attempt: Option<SystemTime>,
    /// Failed runs since the last successful publish.
    pub consecutive_failures: u32,
    /// Number of successful publishes so far.
    pub generation: u64,
    /// Set once the family's collector has been permanently disabled.
    pub disabled: Option<String>,
}

/// Shared handle to the process-wide metric store.
#[derive(Clone)]
pub struct MetricStore {
    families: Arc<ArcSwap<FamilyMap>>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self {
            families: Arc::new(ArcSwap::from_pointee(BTreeMap::new())),
        }
    }

    /// Replace a family's samples as a whole.
    pub fn publish(&self, family: &str, set: SampleSet) {
        let set = Arc::new(set);
        let now = SystemTime::now();
        self.update(family, |prev| FamilyState {
            samples: Some(Arc::clone(&set)),
            published_at: Some(now),
            last_attempt: Some(now),
            consecutive_failures: 0,
            generation: prev.generation + 1,
            disabled: None,
        });
        debug!(%family, samples = set.len(), "family published");
    }

    /// Record a failed run; previously published samples stay in place.
    pub fn record_failure(&self, family: &str) {
        let now = SystemTime::now();
        self.update(family, |prev| FamilyState {
            last_attempt: Some(now),
            consecutive_failures: prev.consecutive_failures.saturating_add(1),
            ..prev.clone()
        });
    }

    /// Record that a family's collector was permanently disabled.
    pub fn mark_disabled(&self, family: &str, reason: &str) {
        let now = SystemTime::now();
        self.update(family, |prev| FamilyState {
            last_attempt: Some(now),
            disabled: Some(reason.to_string()),
            ..prev.clone()
        });
    }

    /// A consistent view of every family as of this instant.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            taken_at: SystemTime::now(),
            families: self.families.load_full(),
        }
    }

    fn update(&self, family: &str, f: impl Fn(&FamilyState) -> FamilyState) {
        let empty = FamilyState::default();
        self.families.rcu(|current| {
            let mut next = FamilyMap::clone(current);
            let prev = current.get(family).map(Arc::as_ref).unwrap_or(&empty);
            next.insert(family.to_string(), Arc::new(f(prev)));
            next
        });
    }
}

impl Default for MetricStore {
    fn default() -> Self {
        Self::new()
    }
}

/// An immutable view of the store at one instant.
#[derive(Debug, Clone)]
pub struct Snapshot {
    taken_at: SystemTime,
    families: Arc<FamilyMap>,
}

impl Snapshot {
    /// Every family the store has heard of, sorted by name.
    pub fn families(&self) -> impl Iterator<Item = (&str, &FamilyState)> {
        self.families.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn family(&self, name: &str) -> Option<&FamilyState> {
        self.families.get(name).map(Arc::as_ref)
    }

    /// The published sample set of a family.
    pub fn sample_set(&self, name: &str) -> Option<&SampleSet> {
        self.family(name)?.samples.as_deref()
    }

    /// Samples of every published family. Never-published families
    /// contribute nothing.
    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.families
            .values()
            .filter_map(|f| f.samples.as_deref())
            .flat_map(|set| set.samples().iter())
    }

    /// Age of a family's published samples at snapshot time.
    pub fn age_secs(&self, name: &str) -> Option<f64> {
        let published = self.family(name)?.published_at?;
        Some(
            self.taken_at
                .duration_since(published)
                .unwrap_or_default()
                .as_secs_f64(),
        )
    }
}
