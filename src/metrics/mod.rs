//! Tagged metrics aggregation.
//!
//! - [`Counter`]: atomic `i64` accumulators
//! - [`Sample`]: exponentially decaying reservoirs reporting mean, a
//!   percentile and max
//! - [`Registry`]: get-or-create by (name, tags), pluggable sources, snapshots

pub mod counter;
pub mod process;
pub mod registry;
pub mod sample;
pub mod types;

pub use counter::Counter;
pub use registry::{FnSource, Registry, StatSource};
pub use sample::{Sample, SampleConfig, SampleStats};
pub use types::{MetricKey, MetricRecord, TagSet};
