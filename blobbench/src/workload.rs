//! A module for defining a [`Workload`] that generates records and operations.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::distr::Alphanumeric;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::weighted::WeightedIndex;
use rand_distr::{Distribution, Zipf};
use serde::{Deserialize, Serialize};

use crate::binding::Record;
use crate::error::{Error, Result};

/// The skew of the zipfian key distributions.
const ZIPFIAN_CONSTANT: f64 = 0.99;

/// How keys are chosen for reads, updates, scans and deletes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyDistribution {
    /// Every existing key is equally likely.
    Uniform,
    /// Few keys are requested a lot, most keys rarely.
    #[default]
    Zipfian,
    /// The most recently inserted keys are requested most.
    Latest,
}

/// A builder for creating a [`Workload`].
#[derive(Debug)]
pub struct WorkloadBuilder {
    seed: u64,
    key_prefix: String,
    record_count: u64,
    operation_count: u64,

    field_count: usize,
    field_length: usize,
    read_all_fields: bool,
    max_scan_length: usize,

    read_weight: u32,
    update_weight: u32,
    insert_weight: u32,
    scan_weight: u32,
    delete_weight: u32,
    distribution: KeyDistribution,
}

impl WorkloadBuilder {
    /// The seed all random choices derive from.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// The prefix of all generated keys.
    pub fn key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    /// The number of records inserted during the load phase.
    pub fn record_count(mut self, record_count: u64) -> Self {
        self.record_count = record_count;
        self
    }

    /// The number of operations performed during the run phase.
    pub fn operation_count(mut self, operation_count: u64) -> Self {
        self.operation_count = operation_count;
        self
    }

    /// The shape of generated records.
    pub fn fields(mut self, count: usize, length: usize) -> Self {
        self.field_count = count;
        self.field_length = length;
        self
    }

    /// Whether reads request all fields, or a single random one.
    pub fn read_all_fields(mut self, read_all_fields: bool) -> Self {
        self.read_all_fields = read_all_fields;
        self
    }

    /// The maximum number of records a scan asks for.
    pub fn max_scan_length(mut self, max_scan_length: usize) -> Self {
        self.max_scan_length = max_scan_length.max(1);
        self
    }

    /// The ratio between reads, updates, inserts, scans and deletes in the run phase.
    pub fn operation_weights(
        mut self,
        reads: u32,
        updates: u32,
        inserts: u32,
        scans: u32,
        deletes: u32,
    ) -> Self {
        self.read_weight = reads;
        self.update_weight = updates;
        self.insert_weight = inserts;
        self.scan_weight = scans;
        self.delete_weight = deletes;
        self
    }

    /// How keys are chosen for operations on existing records.
    pub fn distribution(mut self, distribution: KeyDistribution) -> Self {
        self.distribution = distribution;
        self
    }

    /// Creates the workload instance.
    pub fn build(self) -> Result<Workload> {
        let weights = [
            self.read_weight,
            self.update_weight,
            self.insert_weight,
            self.scan_weight,
            self.delete_weight,
        ];
        let operations = WeightedIndex::new(weights)
            .map_err(|err| Error::InvalidWorkload(format!("operation weights: {err}")))?;

        Ok(Workload {
            seed: self.seed,
            key_prefix: self.key_prefix,
            record_count: self.record_count,
            operation_count: self.operation_count,

            field_count: self.field_count,
            field_length: self.field_length,
            read_all_fields: self.read_all_fields,
            max_scan_length: self.max_scan_length,

            operations,
            distribution: self.distribution,
            inserted: Arc::new(AtomicU64::new(self.record_count)),
        })
    }
}

/// Describes the records and operations of a benchmark.
///
/// The workload is shared by all workers. Each worker draws from its own [`OperationGenerator`].
#[derive(Debug)]
pub struct Workload {
    seed: u64,
    key_prefix: String,
    record_count: u64,
    operation_count: u64,

    field_count: usize,
    field_length: usize,
    read_all_fields: bool,
    max_scan_length: usize,

    /// A distribution over read/update/insert/scan/delete.
    operations: WeightedIndex<u32>,
    distribution: KeyDistribution,
    /// The number of keys that exist, including those inserted during the run phase.
    inserted: Arc<AtomicU64>,
}

impl Workload {
    /// Constructs a new workload builder.
    pub fn builder() -> WorkloadBuilder {
        WorkloadBuilder {
            seed: rand::random(),
            key_prefix: "user".to_owned(),
            record_count: 1000,
            operation_count: 1000,

            field_count: 10,
            field_length: 100,
            read_all_fields: true,
            max_scan_length: 1000,

            read_weight: 95,
            update_weight: 0,
            insert_weight: 0,
            scan_weight: 0,
            delete_weight: 5,
            distribution: KeyDistribution::Zipfian,
        }
    }

    /// Returns the number of records inserted during the load phase.
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Returns the number of operations performed during the run phase.
    pub fn operation_count(&self) -> u64 {
        self.operation_count
    }

    /// Returns the logical key of the `n`-th record.
    pub fn key(&self, n: u64) -> String {
        format!("{}{n}", self.key_prefix)
    }

    /// Returns the names of all fields of a record.
    pub fn field_names(&self) -> impl Iterator<Item = String> + use<> {
        (0..self.field_count).map(|n| format!("field{n}"))
    }

    /// Splits the load phase records into one contiguous range per worker.
    pub fn load_shares(&self, workers: usize) -> Vec<Range<u64>> {
        let mut start = 0;
        split(self.record_count, workers)
            .into_iter()
            .map(|len| {
                let range = start..start + len;
                start += len;
                range
            })
            .collect()
    }

    /// Splits the run phase operations into one count per worker.
    pub fn operation_shares(&self, workers: usize) -> Vec<u64> {
        split(self.operation_count, workers)
    }

    /// Creates the operation generator for the given worker.
    ///
    /// Generators of different workers are seeded differently, but deterministically.
    pub fn generator(self: &Arc<Self>, worker: usize) -> OperationGenerator {
        let rng = SmallRng::seed_from_u64(self.seed.wrapping_add(worker as u64));
        OperationGenerator {
            workload: Arc::clone(self),
            rng,
        }
    }
}

/// Splits `total` into `parts` counts that differ by at most one.
fn split(total: u64, parts: usize) -> Vec<u64> {
    let parts = parts.max(1) as u64;
    let base = total / parts;
    let remainder = total % parts;
    (0..parts)
        .map(|part| base + u64::from(part < remainder))
        .collect()
}

/// An operation of the run phase.
#[derive(Debug)]
pub enum Operation {
    /// Read the record, optionally only some of its fields.
    Read(String, Option<Vec<String>>),
    /// Replace the record.
    Update(String, Record),
    /// Insert a new record.
    Insert(String, Record),
    /// Read a number of records starting at the key.
    Scan(String, usize, Option<Vec<String>>),
    /// Delete the record.
    Delete(String),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read(key, _) => write!(f, "read {key}"),
            Operation::Update(key, _) => write!(f, "update {key}"),
            Operation::Insert(key, _) => write!(f, "insert {key}"),
            Operation::Scan(key, count, _) => write!(f, "scan {key} ({count})"),
            Operation::Delete(key) => write!(f, "delete {key}"),
        }
    }
}

/// Generates records and operations for a single worker.
#[derive(Debug)]
pub struct OperationGenerator {
    workload: Arc<Workload>,
    /// The RNG driving all our distributions.
    rng: SmallRng,
}

impl OperationGenerator {
    /// Generates a record with random field values.
    pub fn record(&mut self) -> Record {
        let length = self.workload.field_length;
        self.workload
            .field_names()
            .map(|name| {
                let value = (&mut self.rng)
                    .sample_iter(Alphanumeric)
                    .take(length)
                    .map(char::from)
                    .collect();
                (name, value)
            })
            .collect()
    }

    /// Draws the next operation of the run phase.
    pub fn next_operation(&mut self) -> Operation {
        let choice = self.workload.operations.sample(&mut self.rng);
        if choice == 2 {
            return self.insert();
        }

        let Some(key) = self.existing_key() else {
            // Nothing to operate on yet.
            return self.insert();
        };

        match choice {
            0 => Operation::Read(key, self.fields()),
            1 => Operation::Update(key, self.record()),
            3 => {
                let count = self.rng.random_range(1..=self.workload.max_scan_length);
                Operation::Scan(key, count, self.fields())
            }
            _ => Operation::Delete(key),
        }
    }

    fn insert(&mut self) -> Operation {
        let n = self.workload.inserted.fetch_add(1, Ordering::Relaxed);
        Operation::Insert(self.workload.key(n), self.record())
    }

    fn fields(&mut self) -> Option<Vec<String>> {
        if self.workload.read_all_fields || self.workload.field_count == 0 {
            return None;
        }
        let field = self.rng.random_range(0..self.workload.field_count);
        Some(vec![format!("field{field}")])
    }

    fn existing_key(&mut self) -> Option<String> {
        let count = self.workload.inserted.load(Ordering::Relaxed);
        if count == 0 {
            return None;
        }

        let n = match self.workload.distribution {
            KeyDistribution::Uniform => self.rng.random_range(0..count),
            KeyDistribution::Zipfian => self.zipf(count) - 1,
            KeyDistribution::Latest => count - self.zipf(count),
        };

        Some(self.workload.key(n))
    }

    /// Samples a rank in `1..=count`, rank 1 being the most likely.
    fn zipf(&mut self, count: u64) -> u64 {
        match Zipf::new(count as f64, ZIPFIAN_CONSTANT) {
            Ok(zipf) => (self.rng.sample(zipf) as u64).clamp(1, count),
            Err(_) => self.rng.random_range(1..=count),
        }
    }
}
