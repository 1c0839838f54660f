//! Registry of counters, samples and computed statistic sources.
//!
//! Counters and samples are created on first use and live for as long as the
//! registry does. Every distinct (name, tags) pair allocates one metric, so
//! callers should keep tag cardinality bounded; nothing is ever evicted.

use crate::metrics::counter::Counter;
use crate::metrics::sample::{Sample, SampleConfig};
use crate::metrics::types::{MetricKey, MetricRecord, TagSet};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Anything that can flatten itself into metric records on demand.
pub trait StatSource: Send + Sync {
    /// Current records, computed fresh on every call
    fn records(&self) -> Vec<MetricRecord>;
}

/// Statistic source backed by a closure.
pub struct FnSource<F>(F);

impl<F> FnSource<F>
where
    F: Fn() -> Vec<MetricRecord> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> StatSource for FnSource<F>
where
    F: Fn() -> Vec<MetricRecord> + Send + Sync,
{
    fn records(&self) -> Vec<MetricRecord> {
        (self.0)()
    }
}

/// Shared metric registry.
///
/// Share it with `Arc<Registry>`; all operations take `&self`.
pub struct Registry {
    sample_config: SampleConfig,
    counters: DashMap<MetricKey, Arc<Counter>>,
    samples: DashMap<MetricKey, Arc<Sample>>,
    sources: RwLock<Vec<Arc<dyn StatSource>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry with default sample settings
    pub fn new() -> Self {
        Self::with_sample_config(SampleConfig::default())
    }

    /// Create an empty registry whose samples use `config`
    pub fn with_sample_config(sample_config: SampleConfig) -> Self {
        Self {
            sample_config,
            counters: DashMap::new(),
            samples: DashMap::new(),
            sources: RwLock::new(Vec::new()),
        }
    }

    pub fn sample_config(&self) -> &SampleConfig {
        &self.sample_config
    }

    /// Add `delta` to the counter for (name, tags), creating it if needed
    pub fn add(&self, name: &str, tags: &TagSet, delta: i64) {
        self.counter(name, tags).increment(delta);
    }

    /// Record `value` in the sample for (name, tags), creating it if needed
    pub fn observe(&self, name: &str, tags: &TagSet, value: i64) {
        self.sample_or_create(name, tags).observe(value);
    }

    /// Append a statistic source; it shows up in every later snapshot
    pub fn register(&self, source: Arc<dyn StatSource>) {
        self.sources.write().push(source);
    }

    /// Append a closure producing records on demand
    pub fn register_fn<F>(&self, f: F)
    where
        F: Fn() -> Vec<MetricRecord> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnSource::new(f)));
    }

    /// Flatten every source, in registration order.
    ///
    /// Sources are read one by one, so the result is not a single atomic view
    /// across metrics.
    pub fn snapshot(&self) -> Vec<MetricRecord> {
        let sources: Vec<Arc<dyn StatSource>> = self.sources.read().clone();
        sources.iter().flat_map(|source| source.records()).collect()
    }

    /// Current value of an existing counter
    pub fn counter_value(&self, name: &str, tags: &TagSet) -> Option<i64> {
        self.counters
            .get(&MetricKey::new(name, tags))
            .map(|entry| entry.value().value())
    }

    /// Existing sample for (name, tags)
    pub fn sample(&self, name: &str, tags: &TagSet) -> Option<Arc<Sample>> {
        self.samples
            .get(&MetricKey::new(name, tags))
            .map(|sample| Arc::clone(sample.value()))
    }

    /// Number of registered sources, counters and samples included
    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn counter(&self, name: &str, tags: &TagSet) -> Arc<Counter> {
        let key = MetricKey::new(name, tags);
        if let Some(counter) = self.counters.get(&key) {
            return Arc::clone(counter.value());
        }

        // The entry holds the shard write lock, so only one caller creates
        // and registers the counter.
        let counter = self.counters.entry(key).or_insert_with(|| {
            let counter = Arc::new(Counter::new(name, tags.clone()));
            self.register(Arc::clone(&counter) as Arc<dyn StatSource>);
            tracing::debug!("Created counter {}", name);
            counter
        });
        Arc::clone(counter.value())
    }

    fn sample_or_create(&self, name: &str, tags: &TagSet) -> Arc<Sample> {
        let key = MetricKey::new(name, tags);
        if let Some(sample) = self.samples.get(&key) {
            return Arc::clone(sample.value());
        }

        let sample = self.samples.entry(key).or_insert_with(|| {
            let sample = Arc::new(Sample::new(name, tags.clone(), self.sample_config));
            self.register(Arc::clone(&sample) as Arc<dyn StatSource>);
            tracing::debug!("Created sample {}", name);
            sample
        });
        Arc::clone(sample.value())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("counters", &self.counters.len())
            .field("samples", &self.samples.len())
            .field("sources", &self.len())
            .finish()
    }
}

/// Serializes as the current snapshot.
impl Serialize for Registry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}
