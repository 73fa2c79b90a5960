//! Latency and outcome measurements of a benchmark phase.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use sketches_ddsketch::DDSketch;

use crate::status::Status;

/// The kinds of operations that are measured, in reporting order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    /// Reading a record.
    Read,
    /// Reading a range of records.
    Scan,
    /// Replacing a record.
    Update,
    /// Inserting a record.
    Insert,
    /// Deleting a record.
    Delete,
    /// Finishing a worker, including the mapping publication.
    Cleanup,
}

impl OperationKind {
    /// All kinds, in reporting order.
    pub const ALL: [OperationKind; 6] = [
        OperationKind::Read,
        OperationKind::Scan,
        OperationKind::Update,
        OperationKind::Insert,
        OperationKind::Delete,
        OperationKind::Cleanup,
    ];

    /// Returns the name used in reports.
    pub fn name(self) -> &'static str {
        match self {
            OperationKind::Read => "READ",
            OperationKind::Scan => "SCAN",
            OperationKind::Update => "UPDATE",
            OperationKind::Insert => "INSERT",
            OperationKind::Delete => "DELETE",
            OperationKind::Cleanup => "CLEANUP",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Timings and outcomes of a single operation kind.
#[derive(Default)]
struct OperationMetrics {
    /// Latencies in seconds.
    timing: DDSketch,
    statuses: BTreeMap<Status, u64>,
}

impl OperationMetrics {
    fn merge(&mut self, other: &OperationMetrics) {
        if let Err(err) = self.timing.merge(&other.timing) {
            tracing::error!(error = ?err, "failed to merge latency sketches");
        }
        for (status, count) in &other.statuses {
            *self.statuses.entry(*status).or_default() += count;
        }
    }

    fn summarize(&self) -> Option<OperationSummary> {
        let operations = self.timing.count() as u64;
        if operations == 0 {
            return None;
        }

        let micros = |seconds: f64| seconds * 1_000_000.0;
        let quantile = |q: f64| self.timing.quantile(q).ok().flatten().map(micros);

        Some(OperationSummary {
            operations,
            average_us: self.timing.sum().map(|sum| micros(sum / operations as f64)),
            min_us: self.timing.min().map(micros),
            max_us: self.timing.max().map(micros),
            p50_us: quantile(0.5),
            p90_us: quantile(0.9),
            p95_us: quantile(0.95),
            p99_us: quantile(0.99),
            statuses: self.statuses.clone(),
        })
    }
}

/// Collects latencies and outcomes of operations.
///
/// Each worker records into its own instance. The runner merges them once the workers finished.
#[derive(Default)]
pub struct Measurements {
    operations: BTreeMap<OperationKind, OperationMetrics>,
}

impl Measurements {
    /// Creates empty measurements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a single operation.
    pub fn record(&mut self, kind: OperationKind, status: Status, elapsed: Duration) {
        let metrics = self.operations.entry(kind).or_default();
        metrics.timing.add(elapsed.as_secs_f64());
        *metrics.statuses.entry(status).or_default() += 1;
    }

    /// Adds all measurements of `other` to this instance.
    pub fn merge(&mut self, other: &Measurements) {
        for (kind, metrics) in &other.operations {
            self.operations.entry(*kind).or_default().merge(metrics);
        }
    }

    /// Returns the number of recorded operations of the given kind.
    pub fn count(&self, kind: OperationKind) -> u64 {
        self.operations
            .get(&kind)
            .map_or(0, |metrics| metrics.timing.count() as u64)
    }

    /// Returns the number of recorded operations of the given kind and outcome.
    pub fn status_count(&self, kind: OperationKind, status: Status) -> u64 {
        self.operations
            .get(&kind)
            .and_then(|metrics| metrics.statuses.get(&status).copied())
            .unwrap_or(0)
    }

    /// Returns the number of all recorded operations, excluding cleanups.
    pub fn total_operations(&self) -> u64 {
        OperationKind::ALL
            .into_iter()
            .filter(|kind| *kind != OperationKind::Cleanup)
            .map(|kind| self.count(kind))
            .sum()
    }

    /// Summarizes the measurements of a phase that ran for `runtime`.
    pub fn summarize(&self, runtime: Duration) -> Summary {
        let operations = OperationKind::ALL
            .into_iter()
            .filter_map(|kind| {
                let summary = self.operations.get(&kind)?.summarize()?;
                Some((kind, summary))
            })
            .collect();

        let seconds = runtime.as_secs_f64();
        let throughput = if seconds > 0.0 {
            self.total_operations() as f64 / seconds
        } else {
            0.0
        };

        Summary {
            runtime,
            throughput,
            operations,
        }
    }
}

impl fmt::Debug for Measurements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in self.operations.keys() {
            map.entry(kind, &self.count(*kind));
        }
        map.finish()
    }
}

/// The summary of a single operation kind. Latencies are in microseconds.
#[derive(Clone, Debug, PartialEq)]
pub struct OperationSummary {
    /// The number of operations.
    pub operations: u64,
    /// The mean latency.
    pub average_us: Option<f64>,
    /// The lowest latency.
    pub min_us: Option<f64>,
    /// The highest latency.
    pub max_us: Option<f64>,
    /// The median latency.
    pub p50_us: Option<f64>,
    /// The 90th percentile latency.
    pub p90_us: Option<f64>,
    /// The 95th percentile latency.
    pub p95_us: Option<f64>,
    /// The 99th percentile latency.
    pub p99_us: Option<f64>,
    /// The number of operations per outcome.
    pub statuses: BTreeMap<Status, u64>,
}

/// The summary of a benchmark phase, ready for export.
#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    /// The wall clock time of the phase.
    pub runtime: Duration,
    /// Operations per second over the whole phase.
    pub throughput: f64,
    /// Summaries of all operation kinds that were recorded, in reporting order.
    pub operations: BTreeMap<OperationKind, OperationSummary>,
}
