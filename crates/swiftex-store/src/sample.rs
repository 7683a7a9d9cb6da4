//! Samples and sample sets.
//!
//! A [`SampleSet`] is the output of one collector run. It is built through
//! a [`SampleSetBuilder`], which guarantees that no two samples share the
//! same metric name and label set, and is immutable afterwards.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use tracing::warn;

/// Label name → label value, kept sorted so equal label sets compare equal.
pub type Labels = BTreeMap<String, String>;

/// Build a label set from `(name, value)` pairs.
pub fn labels<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Labels
where
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// A numeric sample value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleValue {
    Integer(i64),
    Float(f64),
}

impl SampleValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            SampleValue::Integer(n) => n as f64,
            SampleValue::Float(f) => f,
        }
    }
}

impl From<i64> for SampleValue {
    fn from(n: i64) -> Self {
        SampleValue::Integer(n)
    }
}

impl From<u64> for SampleValue {
    fn from(n: u64) -> Self {
        // Counters beyond i64::MAX do not occur in recon data; saturate.
        SampleValue::Integer(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<u32> for SampleValue {
    fn from(n: u32) -> Self {
        SampleValue::Integer(i64::from(n))
    }
}

impl From<usize> for SampleValue {
    fn from(n: usize) -> Self {
        SampleValue::from(n as u64)
    }
}

impl From<f64> for SampleValue {
    fn from(f: f64) -> Self {
        SampleValue::Float(f)
    }
}

impl From<bool> for SampleValue {
    fn from(b: bool) -> Self {
        SampleValue::Integer(i64::from(b))
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SampleValue::Integer(n) => write!(f, "{n}"),
            SampleValue::Float(v) if v.is_nan() => f.write_str("NaN"),
            SampleValue::Float(v) if v == f64::INFINITY => f.write_str("+Inf"),
            SampleValue::Float(v) if v == f64::NEG_INFINITY => f.write_str("-Inf"),
            SampleValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// One observation: metric name, label set, value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub labels: Labels,
    pub value: SampleValue,
}

/// The immutable result of one collector run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleSet {
    samples: Vec<Sample>,
    help: BTreeMap<String, String>,
}

impl SampleSet {
    /// Samples in insertion order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Help text for a metric name, if the collector provided one.
    pub fn help(&self, name: &str) -> Option<&str> {
        self.help.get(name).map(String::as_str)
    }

    /// All samples with the given metric name.
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Sample> + 'a {
        self.samples.iter().filter(move |s| s.name == name)
    }

    /// The value of the sample with exactly this name and label set.
    pub fn value(&self, name: &str, labels: &Labels) -> Option<SampleValue> {
        self.samples
            .iter()
            .find(|s| s.name == name && &s.labels == labels)
            .map(|s| s.value)
    }
}

/// Accumulates samples for one run, rejecting duplicate keys.
#[derive(Debug, Default)]
pub struct SampleSetBuilder {
    samples: Vec<Sample>,
    keys: HashSet<(String, Labels)>,
    help: BTreeMap<String, String>,
}

impl SampleSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach help text to a metric name.
    pub fn describe(&mut self, name: &str, help: &str) -> &mut Self {
        self.help.insert(name.to_string(), help.to_string());
        self
    }

    /// Add a sample. Returns `false` (and keeps the first value) when a
    /// sample with the same name and labels already exists.
    pub fn push(&mut self, name: &str, labels: Labels, value: impl Into<SampleValue>) -> bool {
        let key = (name.to_string(), labels);
        if self.keys.contains(&key) {
            warn!(metric = %name, labels = ?key.1, "duplicate sample dropped");
            return false;
        }
        let (name, labels) = key.clone();
        self.keys.insert(key);
        self.samples.push(Sample {
            name,
            labels,
            value: value.into(),
        });
        true
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn build(self) -> SampleSet {
        SampleSet {
            samples: self.samples,
            help: self.help,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_duplicate_label_sets() {
        let mut b = SampleSetBuilder::new();
        assert!(b.push("swift_async_pending", labels([("node", "a:6000")]), 3u64));
        assert!(b.push("swift_async_pending", labels([("node", "b:6000")]), 4u64));
        assert!(!b.push("swift_async_pending", labels([("node", "a:6000")]), 99u64));
        // Same labels under a different name is a different sample.
        assert!(b.push("swift_exporter_collection_errors", labels([("node", "a:6000")]), 0u64));

        let set = b.build();
        assert_eq!(set.len(), 3);
        assert_eq!(
            set.value("swift_async_pending", &labels([("node", "a:6000")])),
            Some(SampleValue::Integer(3))
        );
    }

    #[test]
    fn label_sets_are_pairwise_distinct_after_build() {
        let mut b = SampleSetBuilder::new();
        for node in ["a", "b", "a", "c", "b"] {
            b.push("m", labels([("node", node)]), 1u64);
        }
        let set = b.build();
        let keys: HashSet<_> = set.samples().iter().map(|s| (&s.name, &s.labels)).collect();
        assert_eq!(keys.len(), set.len());
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn label_order_does_not_matter() {
        let a = labels([("node", "x"), ("device", "sdb")]);
        let b = labels([("device", "sdb"), ("node", "x")]);
        assert_eq!(a, b);
    }

    #[test]
    fn value_formatting() {
        assert_eq!(SampleValue::Integer(42).to_string(), "42");
        assert_eq!(SampleValue::Float(0.25).to_string(), "0.25");
        assert_eq!(SampleValue::Float(f64::NAN).to_string(), "NaN");
        assert_eq!(SampleValue::Float(f64::INFINITY).to_string(), "+Inf");
        assert_eq!(SampleValue::from(true), SampleValue::Integer(1));
        assert_eq!(SampleValue::from(u64::MAX), SampleValue::Integer(i64::MAX));
    }

    #[test]
    fn help_is_carried_into_set() {
        let mut b = SampleSetBuilder::new();
        b.describe("m", "A metric.");
        b.push("m", Labels::new(), 1u64);
        let set = b.build();
        assert_eq!(set.help("m"), Some("A metric."));
        assert_eq!(set.help("other"), None);
        assert_eq!(set.named("m").count(), 1);
    }
}
