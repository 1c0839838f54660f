//! In-memory sink that keeps every written batch.

use crate::core::Result;
use crate::export::point::BatchPoints;
use crate::export::PointSink;
use async_trait::async_trait;
use parking_lot::Mutex;

/// Keeps written batches, useful for tests and local inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<BatchPoints>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches written so far, oldest first
    pub fn batches(&self) -> Vec<BatchPoints> {
        self.batches.lock().clone()
    }

    /// Total number of points across all batches
    pub fn point_count(&self) -> usize {
        self.batches.lock().iter().map(BatchPoints::len).sum()
    }
}

#[async_trait]
impl PointSink for MemorySink {
    async fn write(&self, batch: BatchPoints) -> Result<()> {
        self.batches.lock().push(batch);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
