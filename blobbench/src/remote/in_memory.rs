//! In-memory remote for tests.
//!
//! This provides a [`Remote`] backed by a `HashMap`, removing the need for an HTTP server in unit
//! tests. The remote is [`Clone`] so tests can hold a handle for direct inspection while the
//! harness owns a boxed copy. It counts every call and can be told to fail creates, which makes
//! side effects of the coordination protocol observable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use blobbench_client::{Error, Result, StatusCode};
use bytes::Bytes;

use super::Remote;

#[derive(Debug, Default)]
struct Counters {
    health_checks: AtomicUsize,
    fetches: AtomicUsize,
    creates: AtomicUsize,
    deletes: AtomicUsize,
    closes: AtomicUsize,
    next_id: AtomicUsize,
}

/// A [`Remote`] that keeps objects in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRemote {
    objects: Arc<Mutex<HashMap<String, Bytes>>>,
    counters: Arc<Counters>,
    fail_creates: Arc<AtomicBool>,
    unhealthy: Arc<AtomicBool>,
}

impl InMemoryRemote {
    /// Creates a new, empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an object directly, bypassing the [`Remote`] trait and its counters.
    pub fn insert(&self, body: impl Into<Bytes>) -> String {
        let locator = self.next_locator();
        self.objects
            .lock()
            .unwrap()
            .insert(locator.clone(), body.into());
        locator
    }

    /// Returns a clone of the object stored under `locator`, if present.
    pub fn get_stored(&self, locator: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(locator).cloned()
    }

    /// Returns the number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Returns `true` if the remote has no stored objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes all subsequent creates fail with a server error.
    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Makes all subsequent health checks fail.
    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    /// Returns the number of health checks performed through the [`Remote`] trait.
    pub fn health_checks(&self) -> usize {
        self.counters.health_checks.load(Ordering::SeqCst)
    }

    /// Returns the number of fetches performed through the [`Remote`] trait.
    pub fn fetches(&self) -> usize {
        self.counters.fetches.load(Ordering::SeqCst)
    }

    /// Returns the number of creates performed through the [`Remote`] trait.
    pub fn creates(&self) -> usize {
        self.counters.creates.load(Ordering::SeqCst)
    }

    /// Returns the number of deletes performed through the [`Remote`] trait.
    pub fn deletes(&self) -> usize {
        self.counters.deletes.load(Ordering::SeqCst)
    }

    /// Returns how often the remote was closed.
    ///
    /// Closing is only counted, the remote keeps serving requests afterwards.
    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    /// Returns the total number of calls performed through the [`Remote`] trait.
    pub fn calls(&self) -> usize {
        self.health_checks() + self.fetches() + self.creates() + self.deletes()
    }

    fn next_locator(&self) -> String {
        let id = self.counters.next_id.fetch_add(1, Ordering::SeqCst);
        format!("/mem/{id:08x}")
    }
}

#[async_trait::async_trait]
impl Remote for InMemoryRemote {
    fn describe(&self) -> String {
        "in-memory".to_owned()
    }

    async fn health_check(&self) -> Result<()> {
        self.counters.health_checks.fetch_add(1, Ordering::SeqCst);
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(Error::Unhealthy {
                status: StatusCode::SERVICE_UNAVAILABLE,
            });
        }
        Ok(())
    }

    async fn fetch(&self, locator: &str) -> Result<Bytes> {
        self.counters.fetches.fetch_add(1, Ordering::SeqCst);
        self.get_stored(locator).ok_or(Error::NotFound {
            status: StatusCode::NOT_FOUND,
        })
    }

    async fn create(&self, body: Bytes) -> Result<String> {
        self.counters.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(Error::Server {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "create failed".to_owned(),
            });
        }
        Ok(self.insert(body))
    }

    async fn delete(&self, locator: &str) -> Result<()> {
        self.counters.deletes.fetch_add(1, Ordering::SeqCst);
        match self.objects.lock().unwrap().remove(locator) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound {
                status: StatusCode::NOT_FOUND,
            }),
        }
    }

    fn close(&self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}
