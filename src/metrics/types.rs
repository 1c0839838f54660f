//! Metric identity and snapshot record types.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Label name to label value mapping.
///
/// Labels are kept sorted by name, so two sets built from the same pairs in
/// a different order compare, hash and serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    /// Create an empty tag set
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a label, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Look up a label value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no labels
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Labels in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for TagSet {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl From<HashMap<String, String>> for TagSet {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map.into_iter().collect())
    }
}

impl From<BTreeMap<String, String>> for TagSet {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

/// Canonical identity of a (name, tag set) pair, `name{k1=v1,k2=v2}`.
///
/// Only used for lookups inside the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricKey(String);

impl MetricKey {
    /// Canonicalize a metric name and its tags
    pub fn new(name: &str, tags: &TagSet) -> Self {
        debug_assert!(!name.is_empty(), "metric name must not be empty");

        let mut key = String::with_capacity(name.len() + 2 + tags.len() * 16);
        push_escaped(&mut key, name);
        key.push('{');
        for (i, (k, v)) in tags.iter().enumerate() {
            if i > 0 {
                key.push(',');
            }
            push_escaped(&mut key, k);
            key.push('=');
            push_escaped(&mut key, v);
        }
        key.push('}');
        Self(key)
    }

    /// The canonical string form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Separators inside labels would otherwise let two tag sets share a key.
fn push_escaped(out: &mut String, s: &str) {
    for c in s.chars() {
        if matches!(c, '\\' | ',' | '=' | '{' | '}') {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Flat, immutable snapshot of one metric value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Metric name, including any derived suffix
    pub metric: String,
    /// Labels
    pub tags: TagSet,
    /// Value at snapshot time
    pub value: i64,
}

impl MetricRecord {
    pub fn new(metric: impl Into<String>, tags: TagSet, value: i64) -> Self {
        Self {
            metric: metric.into(),
            tags,
            value,
        }
    }
}
