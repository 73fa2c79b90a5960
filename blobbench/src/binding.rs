//! The per-worker database interface.
//!
//! A [`Harness`] holds everything the workers of one process share: the remote, the key mapping
//! and the coordination state of the current phase. Each worker gets its own [`Binding`] from it,
//! which translates benchmark operations on logical keys into store operations on locators.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use yansi::Paint;

use crate::bootstrap::MappingBootstrapper;
use crate::error::{Error, Result};
use crate::mapping::{self, MAPPING_KEY, MappingStore};
use crate::remote::BoxedRemote;
use crate::rendezvous::LoadRendezvous;
use crate::status::Status;

/// A flat record of field names to values, stored as a JSON object.
pub type Record = BTreeMap<String, String>;

/// The benchmark phase a process runs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Phase {
    /// Populate the store and publish the key mapping.
    Load,
    /// Run traffic against a previously published key mapping.
    Run,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Load => f.write_str("load"),
            Phase::Run => f.write_str("run"),
        }
    }
}

#[derive(Clone, Debug)]
enum PhaseState {
    Load(Arc<LoadRendezvous>),
    Run {
        mapping_id: Arc<str>,
        bootstrapper: Arc<MappingBootstrapper>,
    },
}

/// State shared by all workers of one benchmark process.
///
/// Cloning the harness is cheap, all clones share the same state.
#[derive(Clone, Debug)]
pub struct Harness {
    remote: BoxedRemote,
    mapping: MappingStore,
    phase: PhaseState,
}

impl Harness {
    /// Creates the harness for a load run with the given number of workers.
    pub fn load(remote: BoxedRemote, workers: usize) -> Self {
        Self {
            remote,
            mapping: MappingStore::new(),
            phase: PhaseState::Load(Arc::new(LoadRendezvous::new(workers))),
        }
    }

    /// Creates the harness for a run against the mapping published under `mapping_id`.
    pub fn run(remote: BoxedRemote, mapping_id: impl Into<String>) -> Self {
        let mapping = MappingStore::new();
        let bootstrapper = MappingBootstrapper::new(Arc::clone(&remote), mapping.clone());
        Self {
            remote,
            mapping,
            phase: PhaseState::Run {
                mapping_id: mapping_id.into().into(),
                bootstrapper: Arc::new(bootstrapper),
            },
        }
    }

    /// Returns the phase this harness runs.
    pub fn phase(&self) -> Phase {
        match self.phase {
            PhaseState::Load(_) => Phase::Load,
            PhaseState::Run { .. } => Phase::Run,
        }
    }

    /// Returns the key mapping shared by all workers.
    pub fn mapping(&self) -> &MappingStore {
        &self.mapping
    }

    /// Returns the remote shared by all workers.
    pub fn remote(&self) -> &BoxedRemote {
        &self.remote
    }

    /// Returns the load rendezvous, if this is a load run.
    pub fn rendezvous(&self) -> Option<&LoadRendezvous> {
        match &self.phase {
            PhaseState::Load(rendezvous) => Some(rendezvous),
            PhaseState::Run { .. } => None,
        }
    }

    /// Releases all workers blocked on coordination after a fatal error.
    pub fn abort(&self) {
        if let Some(rendezvous) = self.rendezvous() {
            rendezvous.abort();
        }
    }

    /// Creates the binding for a new worker.
    pub fn binding(&self) -> Binding {
        Binding {
            harness: self.clone(),
        }
    }
}

/// The interface a single worker issues operations through.
#[derive(Debug)]
pub struct Binding {
    harness: Harness,
}

impl Binding {
    /// Prepares the worker.
    ///
    /// Probes the store, and in a run makes sure the key mapping is loaded. Any error is fatal
    /// for the whole process.
    pub async fn init(&self) -> Result<()> {
        let remote = &self.harness.remote;
        remote
            .health_check()
            .await
            .map_err(|source| Error::Unhealthy {
                url: remote.describe(),
                source,
            })?;

        if let PhaseState::Run {
            mapping_id,
            bootstrapper,
        } = &self.harness.phase
        {
            bootstrapper.ensure_loaded(mapping_id).await?;
        }

        Ok(())
    }

    /// Stores a record and remembers its locator under `key`.
    pub async fn insert(&self, key: &str, record: &Record) -> Status {
        let body = match serde_json::to_vec(record) {
            Ok(body) => body,
            Err(ref err) => {
                tracing::warn!(error = err as &dyn std::error::Error, key, "failed to encode record");
                return Status::Error;
            }
        };

        match self.harness.remote.create(Bytes::from(body)).await {
            Ok(locator) => {
                self.harness.mapping.put(key, locator);
                Status::Ok
            }
            Err(ref err) => {
                tracing::warn!(error = err as &dyn std::error::Error, key, "failed to insert record");
                Status::from(err)
            }
        }
    }

    /// Reads the record stored under `key`.
    ///
    /// If `fields` is given, only those fields are returned. Keys that have no locator are
    /// reported as [`Status::NotFound`] without contacting the store.
    pub async fn read(&self, key: &str, fields: Option<&[String]>) -> Result<Record, Status> {
        let Some(locator) = self.harness.mapping.get(key) else {
            tracing::debug!(key, "no locator for key");
            return Err(Status::NotFound);
        };

        let bytes = self
            .harness
            .remote
            .fetch(&locator)
            .await
            .map_err(|ref err| {
                tracing::debug!(error = err as &dyn std::error::Error, key, "failed to read record");
                Status::from(err)
            })?;

        let mut record: Record = serde_json::from_slice(&bytes).map_err(|ref err| {
            tracing::warn!(error = err as &dyn std::error::Error, key, "failed to decode record");
            Status::Error
        })?;

        if let Some(fields) = fields {
            record.retain(|name, _| fields.contains(name));
        }

        Ok(record)
    }

    /// Updates a record in place, which blob stores do not support.
    pub async fn update(&self, _key: &str, _record: &Record) -> Status {
        Status::NotImplemented
    }

    /// Scans a range of records, which blob stores do not support.
    pub async fn scan(
        &self,
        _start_key: &str,
        _count: usize,
        _fields: Option<&[String]>,
    ) -> Result<Vec<Record>, Status> {
        Err(Status::NotImplemented)
    }

    /// Deletes the record stored under `key`.
    ///
    /// Keys that have no locator are reported as [`Status::NotFound`] without contacting the
    /// store.
    pub async fn delete(&self, key: &str) -> Status {
        let Some(locator) = self.harness.mapping.get(key) else {
            tracing::debug!(key, "no locator for key");
            return Status::NotFound;
        };

        match self.harness.remote.delete(&locator).await {
            Ok(()) => Status::Ok,
            Err(ref err) => {
                tracing::debug!(error = err as &dyn std::error::Error, key, "failed to delete record");
                Status::from(err)
            }
        }
    }

    /// Finishes the worker's share of the phase.
    ///
    /// In a load run, this waits for all other workers and publishes the key mapping exactly once.
    /// The worker that published receives the mapping id.
    pub async fn cleanup(&self) -> Result<Option<String>> {
        match &self.harness.phase {
            PhaseState::Load(rendezvous) => rendezvous.complete(|| self.publish_mapping()).await,
            PhaseState::Run { .. } => Ok(None),
        }
    }

    async fn publish_mapping(&self) -> Result<String> {
        let snapshot = self.harness.mapping.snapshot();
        let body = mapping::encode(&snapshot).map_err(Error::EncodeMapping)?;

        let token = self
            .harness
            .remote
            .create(Bytes::from(body))
            .await
            .map_err(Error::Publish)?;
        self.harness.mapping.put(MAPPING_KEY, token.clone());

        tracing::info!(token, entries = snapshot.len(), "published key mapping");
        print_banner(&token);

        Ok(token)
    }
}

fn print_banner(token: &str) {
    println!("{}", "=====================".bold());
    println!(
        "Next run use `blobbench run --mapping-id {}`.",
        token.bold().green()
    );
    println!("{}", "=====================".bold());
}
