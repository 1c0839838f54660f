//! Tagged atomic counters.

use crate::metrics::registry::StatSource;
use crate::metrics::types::{MetricRecord, TagSet};
use std::sync::atomic::{AtomicI64, Ordering};

/// Named, tagged `i64` accumulator updated without locks.
#[derive(Debug)]
pub struct Counter {
    name: String,
    tags: TagSet,
    value: AtomicI64,
}

impl Counter {
    pub fn new(name: impl Into<String>, tags: TagSet) -> Self {
        Self {
            name: name.into(),
            tags,
            value: AtomicI64::new(0),
        }
    }

    /// Add `delta` (may be negative)
    #[inline]
    pub fn increment(&self, delta: i64) {
        if delta == 0 {
            return;
        }
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    #[inline]
    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }
}

impl StatSource for Counter {
    fn records(&self) -> Vec<MetricRecord> {
        vec![MetricRecord::new(self.name.clone(), self.tags.clone(), self.value())]
    }
}
