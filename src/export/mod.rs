//! Periodic export of registry snapshots to time-series sinks.
//!
//! One [`Exporter`] runs per configured sink. Every interval it takes a
//! snapshot, turns each record into a point carrying a single `value` field,
//! and writes the batch. Failed ticks are logged and dropped; the next tick
//! starts from a fresh snapshot.

pub mod influx;
pub mod memory;
pub mod point;

pub use influx::{InfluxClient, InfluxConfig};
pub use memory::MemorySink;
pub use point::{BatchConfig, BatchPoints, FieldValue, Point, Precision};

use crate::core::Result;
use crate::metrics::Registry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Destination of exported batches.
#[async_trait]
pub trait PointSink: Send + Sync {
    /// Write one batch
    async fn write(&self, batch: BatchPoints) -> Result<()>;

    /// Short name used in log messages
    fn name(&self) -> &str {
        "sink"
    }
}

/// Export loop settings
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Time between exports
    pub interval: Duration,
    /// Database (namespace) the points go to
    pub database: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            database: "stats".to_string(),
        }
    }
}

/// Background task writing registry snapshots to a sink.
pub struct Exporter {
    registry: Arc<Registry>,
    sink: Arc<dyn PointSink>,
    config: ExportConfig,
}

impl Exporter {
    pub fn new(registry: Arc<Registry>, sink: Arc<dyn PointSink>, config: ExportConfig) -> Self {
        Self {
            registry,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Convert the current snapshot into a batch stamped with `now`.
    ///
    /// Records that cannot become points are logged and left out.
    pub fn build_batch(&self, now: DateTime<Utc>) -> Result<BatchPoints> {
        let mut batch = BatchPoints::new(BatchConfig {
            database: self.config.database.clone(),
            precision: Precision::Seconds,
        })?;

        for record in self.registry.snapshot() {
            let fields = BTreeMap::from([("value".to_string(), FieldValue::Integer(record.value))]);
            match Point::new(record.metric, record.tags, fields, now) {
                Ok(point) => batch.add_point(point),
                Err(e) => tracing::warn!("Error creating point for {}: {}", self.sink.name(), e),
            }
        }

        Ok(batch)
    }

    /// Run one export pass, returning the number of points written
    pub async fn tick(&self) -> Result<usize> {
        let batch = self.build_batch(Utc::now())?;
        let count = batch.len();
        self.sink.write(batch).await?;
        Ok(count)
    }

    /// Export every interval until `cancel` fires.
    ///
    /// The first export happens one full interval after the call.
    pub async fn run(self, cancel: CancellationToken) {
        let period = self.config.interval;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "Exporting to {} database '{}' every {:?}",
            self.sink.name(),
            self.config.database,
            period
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Exporter for {} stopped", self.sink.name());
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(count) => tracing::info!("Sent {} points to {}.", count, self.sink.name()),
                        Err(e) if e.is_recoverable() => tracing::error!(
                            category = e.category(),
                            "Error sending to {}: {}",
                            self.sink.name(),
                            e
                        ),
                        Err(e) => tracing::error!(
                            category = e.category(),
                            "Error sending to {}, will keep failing until reconfigured: {}",
                            self.sink.name(),
                            e
                        ),
                    }
                }
            }
        }
    }

    /// Spawn [`Exporter::run`] on the current runtime
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
