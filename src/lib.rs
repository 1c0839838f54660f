//! tagstats - in-process tagged metrics aggregation.
//!
//! Collects counters and decaying-reservoir samples addressed by metric name
//! and key/value tags, and periodically exports snapshots to InfluxDB.
//!
//! # Architecture
//!
//! - `metrics`: counters, samples, the shared [`Registry`](metrics::Registry)
//! - `export`: time-series points, sinks and the periodic exporter
//! - `api`: JSON status endpoint and HTTP request instrumentation
//! - `core`: errors and configuration
//! - `cli`: command-line daemon
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tagstats::export::{ExportConfig, Exporter, InfluxClient, InfluxConfig};
//! use tagstats::metrics::{Registry, TagSet};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(Registry::new());
//!     let tags = TagSet::from([("path", "/a")]);
//!     registry.add("requests", &tags, 1);
//!     registry.observe("response_time", &tags, 1250);
//!
//!     let client = InfluxClient::new(InfluxConfig::new("http://localhost:8086"))?;
//!     let cancel = CancellationToken::new();
//!     let exporter = Exporter::new(registry, Arc::new(client), ExportConfig::default());
//!     exporter.spawn(cancel.clone()).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod api;
pub mod cli;
pub mod core;
pub mod export;
pub mod metrics;

// Re-export core types for convenience
pub use crate::core::{Config, Result, StatsError};
pub use crate::metrics::{MetricRecord, Registry, TagSet};
