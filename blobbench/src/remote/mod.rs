//! The operations the harness needs from a blob store.
//!
//! [`Remote`] is implemented for the HTTP [`Client`](blobbench_client::Client), and by
//! [`InMemoryRemote`] for tests.

use std::fmt::Debug;
use std::sync::Arc;

use blobbench_client::Result;
use bytes::Bytes;

mod http;
mod in_memory;

pub use in_memory::InMemoryRemote;

/// A shared, type-erased [`Remote`].
pub type BoxedRemote = Arc<dyn Remote>;

/// A content-addressable blob store.
///
/// Failures are reported as classified [`blobbench_client::Error`]s, so that callers can branch
/// on [`kind`](blobbench_client::Error::kind) regardless of the implementation.
#[async_trait::async_trait]
pub trait Remote: Debug + Send + Sync + 'static {
    /// Returns a human readable description of where the store lives.
    fn describe(&self) -> String;

    /// Fails unless the store is up and serving requests.
    async fn health_check(&self) -> Result<()>;

    /// Fetches the object stored under `locator`.
    async fn fetch(&self, locator: &str) -> Result<Bytes>;

    /// Stores a new object and returns the locator assigned to it.
    async fn create(&self, body: Bytes) -> Result<String>;

    /// Deletes the object stored under `locator`.
    async fn delete(&self, locator: &str) -> Result<()>;

    /// Stops accepting new requests once a phase is over.
    fn close(&self) {}
}
