//! Built-in process and runtime statistics.

use crate::metrics::registry::{Registry, StatSource};
use crate::metrics::types::{MetricRecord, TagSet};
use parking_lot::Mutex;
use std::sync::Arc;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Computed source reading memory and uptime of the current process, plus
/// worker and task counts of the ambient tokio runtime.
pub struct ProcessStats {
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl Default for ProcessStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessStats {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!("Process statistics unavailable: {}", e);
                None
            },
        };
        Self {
            pid,
            system: Mutex::new(System::new()),
        }
    }

    fn process_records(&self, records: &mut Vec<MetricRecord>) {
        let Some(pid) = self.pid else {
            return;
        };

        let mut system = self.system.lock();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );

        if let Some(process) = system.process(pid) {
            records.push(record("process_resident_memory", process.memory()));
            records.push(record("process_virtual_memory", process.virtual_memory()));
            records.push(record("process_uptime_seconds", process.run_time()));
        }
    }
}

impl StatSource for ProcessStats {
    fn records(&self) -> Vec<MetricRecord> {
        let mut records = Vec::with_capacity(5);
        self.process_records(&mut records);

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let metrics = handle.metrics();
            records.push(record("runtime_workers", metrics.num_workers() as u64));
            records.push(record("runtime_alive_tasks", metrics.num_alive_tasks() as u64));
        }

        records
    }
}

fn record(name: &str, value: u64) -> MetricRecord {
    MetricRecord::new(name, TagSet::new(), i64::try_from(value).unwrap_or(i64::MAX))
}

/// Register the process statistics source with `registry`
pub fn register(registry: &Registry) {
    registry.register(Arc::new(ProcessStats::new()));
}
