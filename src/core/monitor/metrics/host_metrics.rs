use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::{
    CpuRefreshKind, MemoryRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind,
    System,
};

use crate::core::monitor::connection::{Connection, SqlValue};
use crate::core::monitor::metric::{
    integer, real, Category, CollectOptions, Metric, MetricData, MetricDescriptor, StorageSchema,
    StoredRow, Summary,
};
use crate::error::Result;

static DESCRIPTOR: MetricDescriptor = MetricDescriptor {
    name: "HostMetrics",
    display_name: "Host Metrics",
    description: "Host system metrics (CPU, memory, swap, load)",
    category: Category::System,
};

static SCHEMA: StorageSchema = StorageSchema {
    table: "host_metrics_history",
    columns: &[
        real("cpu_percent"),
        integer("cpu_count"),
        real("process_cpu_percent"),
        real("memory_percent"),
        real("memory_used_gb"),
        real("memory_total_gb"),
        real("swap_percent"),
        real("process_memory_mb"),
    ],
    indexes: &[],
};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// Host figures at collection time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostSnapshot {
    pub cpu_percent: f64,
    pub cpu_count: i64,
    pub process_cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_used_gb: f64,
    pub memory_total_gb: f64,
    pub swap_percent: f64,
    /// 1, 5 and 15 minute load averages (zeros where unsupported)
    pub load_avg: [f64; 3],
    pub process_memory_mb: f64,
}

fn percent(used: u64, total: u64) -> f64 {
    if total > 0 {
        (used as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Local host resources via `sysinfo`. The database connection is not used.
///
/// CPU figures are deltas between refreshes, so the first collection after
/// start reports usage since construction.
pub struct HostMetrics {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl HostMetrics {
    pub fn new() -> Self {
        let refresh_kind = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
            .with_memory(MemoryRefreshKind::everything());
        let mut system = System::new_with_specifics(refresh_kind);
        let pid = sysinfo::get_current_pid().ok();
        if let Some(pid) = pid {
            system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                true,
                ProcessRefreshKind::nothing().with_cpu().with_memory(),
            );
        }
        Self {
            system: Mutex::new(system),
            pid,
        }
    }

    fn snapshot(&self) -> HostSnapshot {
        let mut system = self.system.lock();
        system.refresh_cpu_usage();
        system.refresh_memory();

        let (process_cpu_percent, process_memory_mb) = match self.pid {
            Some(pid) => {
                system.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[pid]),
                    true,
                    ProcessRefreshKind::nothing().with_cpu().with_memory(),
                );
                system
                    .process(pid)
                    .map(|p| (p.cpu_usage() as f64, p.memory() as f64 / MIB))
                    .unwrap_or((0.0, 0.0))
            }
            None => (0.0, 0.0),
        };

        let load = System::load_average();
        HostSnapshot {
            cpu_percent: system.global_cpu_usage() as f64,
            cpu_count: system.cpus().len() as i64,
            process_cpu_percent,
            memory_percent: percent(system.used_memory(), system.total_memory()),
            memory_used_gb: system.used_memory() as f64 / GIB,
            memory_total_gb: system.total_memory() as f64 / GIB,
            swap_percent: percent(system.used_swap(), system.total_swap()),
            load_avg: [load.one, load.five, load.fifteen],
            process_memory_mb,
        }
    }
}

impl Default for HostMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metric for HostMetrics {
    fn descriptor(&self) -> &MetricDescriptor {
        &DESCRIPTOR
    }

    fn collect(&self, _conn: &dyn Connection, _options: &CollectOptions) -> Result<Option<MetricData>> {
        MetricData::from_record(&self.snapshot()).map(Some)
    }

    fn storage_schema(&self) -> Option<&StorageSchema> {
        Some(&SCHEMA)
    }

    fn storage_rows(&self, data: &MetricData) -> Result<Vec<StoredRow>> {
        let s: HostSnapshot = data.decode()?;
        Ok(vec![vec![
            SqlValue::from(s.cpu_percent),
            SqlValue::from(s.cpu_count),
            SqlValue::from(s.process_cpu_percent),
            SqlValue::from(s.memory_percent),
            SqlValue::from(s.memory_used_gb),
            SqlValue::from(s.memory_total_gb),
            SqlValue::from(s.swap_percent),
            SqlValue::from(s.process_memory_mb),
        ]])
    }

    fn render_summary(&self, data: &MetricData) -> Option<Summary> {
        let s: HostSnapshot = data.decode().ok()?;
        Some(
            Summary::new()
                .with("CPU %", format!("{:.1}", s.cpu_percent))
                .with("Memory %", format!("{:.1}", s.memory_percent))
                .with("Swap %", format!("{:.1}", s.swap_percent))
                .with("Load (1m)", format!("{:.2}", s.load_avg[0])),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fixture::FixtureConnection;

    #[test]
    fn test_collect_ignores_connection() {
        let conn = FixtureConnection::default();
        let metric = HostMetrics::new();
        let data = metric
            .collect(&conn, &CollectOptions::default())
            .unwrap()
            .unwrap();
        let snapshot: HostSnapshot = data.decode().unwrap();
        assert!(snapshot.memory_total_gb > 0.0);
        assert!((0.0..=100.0).contains(&snapshot.memory_percent));
        assert!(conn.executed().is_empty());
        assert_eq!(metric.storage_rows(&data).unwrap().len(), 1);
    }

    #[test]
    fn test_percent_of_zero_total() {
        assert_eq!(percent(5, 0), 0.0);
        assert_eq!(percent(1, 4), 25.0);
    }
}
