//! Exponentially decaying reservoir samples.
//!
//! Each observation made `t` seconds after the sample's landmark is kept with
//! priority `exp(alpha * t) * u`, `u` uniform in (0, 1]. A full reservoir
//! evicts its lowest priority entry when a higher one arrives, so retention
//! is biased toward recent values while memory stays bounded by the capacity.
//!
//! Priorities grow without bound, so once an hour the landmark moves forward
//! and every stored priority is scaled down by the same factor.

use crate::core::{Result, StatsError};
use crate::metrics::registry::StatSource;
use crate::metrics::types::{MetricRecord, TagSet};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

/// Default number of reservoir slots
pub const DEFAULT_CAPACITY: usize = 1028;
/// Default decay rate, per second
pub const DEFAULT_ALPHA: f64 = 0.015;
/// Default reported percentile
pub const DEFAULT_PERCENTILE: f64 = 0.95;

const RESCALE_THRESHOLD: Duration = Duration::from_secs(60 * 60);

/// Reservoir settings shared by every sample of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    /// Reservoir slots per sample
    pub capacity: usize,
    /// Exponential decay rate
    pub alpha: f64,
    /// Percentile reported in snapshots, in (0, 1)
    pub percentile: f64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            alpha: DEFAULT_ALPHA,
            percentile: DEFAULT_PERCENTILE,
        }
    }
}

impl SampleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(StatsError::config("sample capacity must be greater than 0"));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(StatsError::config(format!(
                "sample alpha must be a positive number, got {}",
                self.alpha
            )));
        }
        if !(self.percentile > 0.0 && self.percentile < 1.0) {
            return Err(StatsError::config(format!(
                "percentile must be between 0 and 1, got {}",
                self.percentile
            )));
        }
        Ok(())
    }

    /// Name suffix of the percentile record: `95` for 0.95, `99_9` for 0.999
    pub fn percentile_suffix(&self) -> String {
        let pct = self.percentile * 100.0;
        if (pct - pct.round()).abs() < 1e-9 {
            format!("{}", pct.round() as i64)
        } else {
            format!("{}", (pct * 1e6).round() / 1e6).replace('.', "_")
        }
    }
}

// `priority` is the natural log of `exp(alpha * t) * u`, so rescaling is a
// subtraction and cannot underflow however long the reservoir sat idle.
#[derive(Debug, Clone, Copy)]
struct Entry {
    priority: f64,
    value: i64,
}

// Reversed so that `BinaryHeap` keeps the lowest priority on top.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.priority.total_cmp(&self.priority)
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

#[derive(Debug)]
struct Reservoir {
    landmark: Instant,
    next_rescale: Instant,
    entries: BinaryHeap<Entry>,
}

impl Reservoir {
    fn new(now: Instant, capacity: usize) -> Self {
        Self {
            landmark: now,
            next_rescale: now + RESCALE_THRESHOLD,
            entries: BinaryHeap::with_capacity(capacity),
        }
    }

    fn update(&mut self, now: Instant, value: i64, config: &SampleConfig) {
        if now >= self.next_rescale {
            self.rescale(now, config.alpha);
        }

        let elapsed = now.saturating_duration_since(self.landmark).as_secs_f64();
        let u = 1.0 - fastrand::f64();
        let priority = config.alpha * elapsed + u.ln();
        let entry = Entry { priority, value };

        if self.entries.len() < config.capacity {
            self.entries.push(entry);
        } else if let Some(mut lowest) = self.entries.peek_mut() {
            if priority > lowest.priority {
                *lowest = entry;
            }
        }
    }

    fn rescale(&mut self, now: Instant, alpha: f64) {
        let elapsed = now.saturating_duration_since(self.landmark).as_secs_f64();
        let shift = alpha * elapsed;
        self.landmark = now;
        self.next_rescale = now + RESCALE_THRESHOLD;

        // Subtracting one constant keeps the relative order of every entry.
        let entries = std::mem::take(&mut self.entries).into_vec();
        self.entries = entries
            .into_iter()
            .map(|e| Entry {
                priority: e.priority - shift,
                value: e.value,
            })
            .collect();
    }

    fn sorted_values(&self) -> Vec<i64> {
        let mut values: Vec<i64> = self.entries.iter().map(|e| e.value).collect();
        values.sort_unstable();
        values
    }
}

/// Statistics computed over one consistent view of a reservoir.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SampleStats {
    pub count: usize,
    pub mean: f64,
    pub percentile: f64,
    pub min: i64,
    pub max: i64,
}

/// Named, tagged decaying sample.
#[derive(Debug)]
pub struct Sample {
    name: String,
    tags: TagSet,
    config: SampleConfig,
    reservoir: Mutex<Reservoir>,
}

impl Sample {
    pub fn new(name: impl Into<String>, tags: TagSet, config: SampleConfig) -> Self {
        Self {
            name: name.into(),
            tags,
            config,
            reservoir: Mutex::new(Reservoir::new(Instant::now(), config.capacity)),
        }
    }

    /// Record one observation
    pub fn observe(&self, value: i64) {
        self.observe_at(Instant::now(), value);
    }

    pub(crate) fn observe_at(&self, now: Instant, value: i64) {
        self.reservoir.lock().update(now, value, &self.config);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn config(&self) -> &SampleConfig {
        &self.config
    }

    /// Number of retained observations
    pub fn len(&self) -> usize {
        self.reservoir.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retained values, sorted ascending
    pub fn values(&self) -> Vec<i64> {
        self.reservoir.lock().sorted_values()
    }

    /// Arithmetic mean of retained values, 0 when empty
    pub fn mean(&self) -> f64 {
        mean_of(&self.values())
    }

    /// Interpolated percentile of retained values, 0 when empty
    pub fn percentile(&self, p: f64) -> f64 {
        percentile_of(&self.values(), p)
    }

    /// Largest retained value, 0 when empty
    pub fn max(&self) -> i64 {
        self.values().last().copied().unwrap_or(0)
    }

    /// Smallest retained value, 0 when empty
    pub fn min(&self) -> i64 {
        self.values().first().copied().unwrap_or(0)
    }

    /// Mean, configured percentile, min and max under a single lock
    pub fn stats(&self) -> SampleStats {
        let values = self.values();
        SampleStats {
            count: values.len(),
            mean: mean_of(&values),
            percentile: percentile_of(&values, self.config.percentile),
            min: values.first().copied().unwrap_or(0),
            max: values.last().copied().unwrap_or(0),
        }
    }

    #[cfg(test)]
    fn landmark(&self) -> Instant {
        self.reservoir.lock().landmark
    }

    #[cfg(test)]
    fn entries(&self) -> Vec<(f64, i64)> {
        self.reservoir
            .lock()
            .entries
            .iter()
            .map(|e| (e.priority, e.value))
            .collect()
    }
}

impl StatSource for Sample {
    #[allow(clippy::cast_possible_truncation)]
    fn records(&self) -> Vec<MetricRecord> {
        let stats = self.stats();
        vec![
            MetricRecord::new(format!("{}_avg", self.name), self.tags.clone(), stats.mean as i64),
            MetricRecord::new(
                format!("{}_{}", self.name, self.config.percentile_suffix()),
                self.tags.clone(),
                stats.percentile as i64,
            ),
            MetricRecord::new(format!("{}_max", self.name), self.tags.clone(), stats.max),
        ]
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_of(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: i128 = values.iter().map(|&v| i128::from(v)).sum();
    sum as f64 / values.len() as f64
}

// `sorted` must be ascending.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn percentile_of(sorted: &[i64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }

    let pos = p * (n + 1) as f64;
    if pos < 1.0 {
        sorted[0] as f64
    } else if pos >= n as f64 {
        sorted[n - 1] as f64
    } else {
        let idx = pos as usize;
        let lower = sorted[idx - 1] as f64;
        let upper = sorted[idx] as f64;
        lower + (pos - pos.floor()) * (upper - lower)
    }
}
