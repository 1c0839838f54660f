//! Common test utilities and fixtures.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tagstats::export::{BatchPoints, PointSink};
use tagstats::{Result, StatsError, TagSet};

/// Sink failing its first `failures` writes, then keeping batches.
pub struct FlakySink {
    failures: usize,
    attempts: AtomicUsize,
    written: Mutex<Vec<BatchPoints>>,
}

impl FlakySink {
    pub fn failing(failures: usize) -> Self {
        Self {
            failures,
            attempts: AtomicUsize::new(0),
            written: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn written(&self) -> Vec<BatchPoints> {
        self.written.lock().clone()
    }
}

#[async_trait]
impl PointSink for FlakySink {
    async fn write(&self, batch: BatchPoints) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(StatsError::sink("error response: 503 service unavailable"));
        }
        self.written.lock().push(batch);
        Ok(())
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

pub fn path_tags(path: &str) -> TagSet {
    TagSet::from([("path", path), ("server", "test-server")])
}
