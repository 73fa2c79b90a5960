//! Run a benchmark phase concurrently against a blob store and collect measurements.

use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinSet;

use crate::binding::{Binding, Harness, Phase};
use crate::error::{Error, Result};
use crate::measurements::{Measurements, OperationKind, Summary};
use crate::remote::BoxedRemote;
use crate::status::Status;
use crate::workload::{Operation, OperationGenerator, Workload};

/// The outcome of a benchmark phase.
#[derive(Debug)]
pub struct Report {
    /// The phase that ran.
    pub phase: Phase,
    /// The merged measurements of all workers.
    pub measurements: Measurements,
    /// The summary ready for export.
    pub summary: Summary,
    /// The reference token of the key mapping published by a load run.
    pub mapping_id: Option<String>,
}

/// Runs one benchmark phase with a fixed number of workers.
#[derive(Debug)]
pub struct Runner {
    harness: Harness,
    workload: Arc<Workload>,
    workers: usize,
    max_execution_time: Option<Duration>,
    progress: bool,
}

impl Runner {
    /// Creates a runner that loads the workload's records and publishes the key mapping.
    pub fn load(remote: BoxedRemote, workload: Workload, workers: usize) -> Self {
        let workers = workers.max(1);
        Self::new(Harness::load(remote, workers), workload, workers)
    }

    /// Creates a runner that runs the workload's operations against a published key mapping.
    pub fn run(
        remote: BoxedRemote,
        workload: Workload,
        workers: usize,
        mapping_id: impl Into<String>,
    ) -> Self {
        Self::new(Harness::run(remote, mapping_id), workload, workers.max(1))
    }

    fn new(harness: Harness, workload: Workload, workers: usize) -> Self {
        Self {
            harness,
            workload: Arc::new(workload),
            workers,
            max_execution_time: None,
            progress: true,
        }
    }

    /// Stops issuing operations after the given time.
    ///
    /// Load workers still rendezvous and publish the mapping of what they inserted so far.
    pub fn max_execution_time(mut self, max_execution_time: Option<Duration>) -> Self {
        self.max_execution_time = max_execution_time;
        self
    }

    /// Whether to draw a progress bar on the terminal.
    pub fn show_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Returns the state shared by the workers.
    pub fn harness(&self) -> &Harness {
        &self.harness
    }

    /// Runs the phase to completion.
    ///
    /// All workers are initialized before any of them issues an operation. If a worker fails
    /// fatally, all coordination is aborted and the first error is returned.
    pub async fn run_phase(self) -> Result<Report> {
        let phase = self.harness.phase();
        let bindings: Vec<_> = (0..self.workers).map(|_| self.harness.binding()).collect();

        let init = bindings.iter().map(Binding::init);
        if let Err(err) = futures::future::try_join_all(init).await {
            self.harness.abort();
            self.harness.remote().close();
            return Err(err);
        }
        tracing::info!(%phase, workers = self.workers, "all workers initialized");

        let bar = self.progress_bar(phase);
        let start = Instant::now();
        let deadline = self
            .max_execution_time
            .map(|duration| tokio::time::Instant::now() + duration);

        let mut tasks = JoinSet::new();
        match phase {
            Phase::Load => {
                let shares = self.workload.load_shares(self.workers);
                for (worker, (binding, share)) in bindings.into_iter().zip(shares).enumerate() {
                    let worker = Worker {
                        binding,
                        generator: self.workload.generator(worker),
                        deadline,
                        bar: bar.clone(),
                    };
                    let workload = Arc::clone(&self.workload);
                    tasks.spawn(async move {
                        let keys = share.map(|n| workload.key(n));
                        worker.load(keys).await
                    });
                }
            }
            Phase::Run => {
                let shares = self.workload.operation_shares(self.workers);
                for (worker, (binding, count)) in bindings.into_iter().zip(shares).enumerate() {
                    let worker = Worker {
                        binding,
                        generator: self.workload.generator(worker),
                        deadline,
                        bar: bar.clone(),
                    };
                    tasks.spawn(worker.run(count));
                }
            }
        }

        let mut measurements = Measurements::new();
        let mut mapping_id = None;
        let mut failure: Option<Error> = None;

        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(Error::from).and_then(|result| result);
            match result {
                Ok((worker_measurements, token)) => {
                    measurements.merge(&worker_measurements);
                    if token.is_some() {
                        mapping_id = token;
                    }
                }
                Err(err) => {
                    tracing::error!(error = &err as &dyn std::error::Error, "worker failed");
                    self.harness.abort();
                    let replace = match &failure {
                        None => true,
                        Some(reported) => is_consequence(reported) && !is_consequence(&err),
                    };
                    if replace {
                        failure = Some(err);
                    }
                }
            }
        }

        bar.finish_and_clear();
        self.harness.remote().close();
        if let Some(err) = failure {
            return Err(err);
        }

        let runtime = start.elapsed();
        let summary = measurements.summarize(runtime);
        tracing::info!(%phase, ?runtime, operations = measurements.total_operations(), "phase finished");

        Ok(Report {
            phase,
            measurements,
            summary,
            mapping_id,
        })
    }

    fn progress_bar(&self, phase: Phase) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }

        let total = match phase {
            Phase::Load => self.workload.record_count(),
            Phase::Run => self.workload.operation_count(),
        };
        let style = ProgressStyle::with_template("{msg}\n{wide_bar} {pos}/{len} {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());

        let bar = ProgressBar::new(total)
            .with_style(style)
            .with_message(format!("Running {phase} phase:"));
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }
}

/// Returns `true` for errors that only report a failure of another worker.
///
/// The failing worker reports the cause, which takes precedence.
fn is_consequence(err: &Error) -> bool {
    matches!(
        err,
        Error::Aborted | Error::PublishFailed | Error::BootstrapFailed
    )
}

/// A single worker of a phase.
struct Worker {
    binding: Binding,
    generator: OperationGenerator,
    deadline: Option<tokio::time::Instant>,
    bar: ProgressBar,
}

type WorkerResult = Result<(Measurements, Option<String>)>;

impl Worker {
    fn expired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| tokio::time::Instant::now() >= deadline)
    }

    async fn load(mut self, keys: impl Iterator<Item = String>) -> WorkerResult {
        let mut measurements = Measurements::new();

        for key in keys {
            if self.expired() {
                tracing::debug!("max execution time reached");
                break;
            }

            let record = self.generator.record();
            let start = Instant::now();
            let status = self.binding.insert(&key, &record).await;
            measurements.record(OperationKind::Insert, status, start.elapsed());
            self.bar.inc(1);
        }

        self.cleanup(measurements).await
    }

    async fn run(mut self, count: u64) -> WorkerResult {
        let mut measurements = Measurements::new();

        for _ in 0..count {
            if self.expired() {
                tracing::debug!("max execution time reached");
                break;
            }

            let operation = self.generator.next_operation();
            tracing::trace!(%operation);

            let start = Instant::now();
            let (kind, status) = execute(&self.binding, operation).await;
            measurements.record(kind, status, start.elapsed());
            self.bar.inc(1);
        }

        self.cleanup(measurements).await
    }

    async fn cleanup(self, mut measurements: Measurements) -> WorkerResult {
        let start = Instant::now();
        let result = self.binding.cleanup().await;
        let status = if result.is_ok() {
            Status::Ok
        } else {
            Status::Error
        };
        measurements.record(OperationKind::Cleanup, status, start.elapsed());

        Ok((measurements, result?))
    }
}

async fn execute(binding: &Binding, operation: Operation) -> (OperationKind, Status) {
    match operation {
        Operation::Read(key, fields) => {
            let status = match binding.read(&key, fields.as_deref()).await {
                Ok(_) => Status::Ok,
                Err(status) => status,
            };
            (OperationKind::Read, status)
        }
        Operation::Update(key, record) => {
            (OperationKind::Update, binding.update(&key, &record).await)
        }
        Operation::Insert(key, record) => {
            (OperationKind::Insert, binding.insert(&key, &record).await)
        }
        Operation::Scan(key, count, fields) => {
            let status = match binding.scan(&key, count, fields.as_deref()).await {
                Ok(_) => Status::Ok,
                Err(status) => status,
            };
            (OperationKind::Scan, status)
        }
        Operation::Delete(key) => (OperationKind::Delete, binding.delete(&key).await),
    }
}

#[cfg(test)]
mod tests {
    use crate::mapping::{self, MAPPING_KEY};
    use crate::remote::InMemoryRemote;

    use super::*;

    fn workload(records: u64, operations: u64) -> Workload {
        Workload::builder()
            .record_count(records)
            .operation_count(operations)
            .fields(2, 8)
            .seed(5)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn load_publishes_union_of_all_workers() {
        let remote = InMemoryRemote::new();
        let runner = Runner::load(Arc::new(remote.clone()), workload(100, 0), 7).show_progress(false);
        let report = runner.run_phase().await.unwrap();

        let token = report.mapping_id.unwrap();
        let published = mapping::decode(&remote.get_stored(&token).unwrap()).unwrap();
        assert_eq!(published.len(), 100);
        assert!((0..100).all(|n| published.contains_key(&format!("user{n}"))));

        // One create per record, plus the mapping itself.
        assert_eq!(remote.creates(), 101);
        assert_eq!(report.measurements.count(OperationKind::Insert), 100);
        assert_eq!(report.measurements.count(OperationKind::Cleanup), 7);
        assert_eq!(report.phase, Phase::Load);
        assert_eq!(remote.closes(), 1);
    }

    #[tokio::test]
    async fn more_workers_than_records() {
        let remote = InMemoryRemote::new();
        let runner = Runner::load(Arc::new(remote.clone()), workload(3, 0), 8).show_progress(false);
        let report = runner.run_phase().await.unwrap();

        assert!(report.mapping_id.is_some());
        assert_eq!(remote.creates(), 4);
    }

    #[tokio::test]
    async fn failed_publish_fails_the_load() {
        let remote = InMemoryRemote::new();
        remote.fail_creates(true);

        let runner = Runner::load(Arc::new(remote.clone()), workload(10, 0), 2).show_progress(false);
        let err = runner.run_phase().await.unwrap_err();
        assert!(err.is_coordination(), "{err:?}");
        // The publisher's error is reported, not its echo in the other worker.
        assert!(matches!(err, Error::Publish(_)), "{err:?}");
        // Ten failed inserts and a single publish attempt.
        assert_eq!(remote.creates(), 11);
        assert_eq!(remote.closes(), 1);
    }

    #[tokio::test]
    async fn run_reads_loaded_records() {
        let remote = InMemoryRemote::new();
        let load = Runner::load(Arc::new(remote.clone()), workload(50, 0), 4).show_progress(false);
        let token = load.run_phase().await.unwrap().mapping_id.unwrap();

        let reads = Workload::builder()
            .record_count(50)
            .operation_count(200)
            .operation_weights(1, 0, 0, 0, 0)
            .build()
            .unwrap();
        let run = Runner::run(Arc::new(remote.clone()), reads, 4, token.clone()).show_progress(false);
        assert_eq!(run.harness().phase(), Phase::Run);

        let report = run.run_phase().await.unwrap();
        assert_eq!(report.mapping_id, None);
        assert_eq!(report.measurements.count(OperationKind::Read), 200);
        assert_eq!(
            report
                .measurements
                .status_count(OperationKind::Read, Status::Ok),
            200
        );
    }

    #[tokio::test]
    async fn unsupported_operations_are_reported() {
        let remote = InMemoryRemote::new();
        let load = Runner::load(Arc::new(remote.clone()), workload(10, 0), 1).show_progress(false);
        let token = load.run_phase().await.unwrap().mapping_id.unwrap();

        let updates = Workload::builder()
            .record_count(10)
            .operation_count(20)
            .operation_weights(0, 1, 0, 1, 0)
            .build()
            .unwrap();
        let report = Runner::run(Arc::new(remote), updates, 2, token)
            .show_progress(false)
            .run_phase()
            .await
            .unwrap();

        let unsupported = report
            .measurements
            .status_count(OperationKind::Update, Status::NotImplemented)
            + report
                .measurements
                .status_count(OperationKind::Scan, Status::NotImplemented);
        assert_eq!(unsupported, 20);
    }

    #[tokio::test]
    async fn run_without_published_mapping_fails_at_startup() {
        let remote = InMemoryRemote::new();
        let runner = Runner::run(Arc::new(remote.clone()), workload(10, 10), 3, "/mem/nothing")
            .show_progress(false);

        let err = runner.run_phase().await.unwrap_err();
        assert!(err.is_configuration(), "{err:?}");
        // No traffic besides health checks and the single mapping fetch.
        assert_eq!(remote.fetches(), 1);
        assert_eq!(remote.creates(), 0);
    }

    #[tokio::test]
    async fn unhealthy_store_fails_at_startup() {
        let remote = InMemoryRemote::new();
        remote.set_unhealthy(true);

        let runner = Runner::load(Arc::new(remote.clone()), workload(10, 0), 2).show_progress(false);
        let err = runner.run_phase().await.unwrap_err();
        assert!(matches!(err, Error::Unhealthy { .. }), "{err:?}");
        assert_eq!(remote.creates(), 0);
        assert_eq!(remote.closes(), 1);
    }

    #[test]
    fn causes_take_precedence_over_consequences() {
        assert!(is_consequence(&Error::Aborted));
        assert!(is_consequence(&Error::PublishFailed));
        assert!(is_consequence(&Error::BootstrapFailed));
        assert!(!is_consequence(&Error::MissingMappingId));
    }

    #[tokio::test]
    async fn deadline_stops_issuing_operations() {
        let remote = InMemoryRemote::new();
        let runner = Runner::load(Arc::new(remote.clone()), workload(1000, 0), 2)
            .max_execution_time(Some(Duration::ZERO))
            .show_progress(false);

        let report = runner.run_phase().await.unwrap();
        assert_eq!(report.measurements.count(OperationKind::Insert), 0);

        // The (empty) mapping is still published.
        let token = report.mapping_id.unwrap();
        assert!(mapping::decode(&remote.get_stored(&token).unwrap()).unwrap().is_empty());
        assert!(!token.is_empty());
        assert_ne!(token, MAPPING_KEY);
    }
}
