//! The load phase rendezvous.
//!
//! Workers of a load run insert records independently. Before the key mapping may be published,
//! every worker has to be done inserting, and exactly one of them must publish it. The
//! [`LoadRendezvous`] provides both: a barrier sized to the worker count, followed by a lock
//! guarding a one-shot [`Publication`] state.
//!
//! The rendezvous is created once per load run, before any worker starts, and shared by all
//! workers. A worker that fails fatally [`abort`](LoadRendezvous::abort)s it, which wakes all
//! workers blocked on the barrier with [`Error::Aborted`].

use std::future::Future;

use tokio::sync::{Barrier, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// The one-shot state of the mapping publication.
///
/// The state only moves forward, from `Pending` to either `Published` or `Failed`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Publication {
    /// Nobody has published the mapping yet.
    Pending,
    /// The mapping was published under the contained reference token.
    Published(String),
    /// The elected worker failed to publish the mapping.
    Failed,
}

/// Synchronizes the workers of a load run and elects the mapping publisher.
#[derive(Debug)]
pub struct LoadRendezvous {
    workers: usize,
    barrier: Barrier,
    aborted: CancellationToken,
    publication: Mutex<Publication>,
}

impl LoadRendezvous {
    /// Creates a rendezvous for the given number of workers.
    ///
    /// The worker count is fixed for the lifetime of the rendezvous.
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            barrier: Barrier::new(workers),
            aborted: CancellationToken::new(),
            publication: Mutex::new(Publication::Pending),
        }
    }

    /// Returns the number of workers the barrier waits for.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Breaks the rendezvous.
    ///
    /// All workers currently waiting in [`arrive`](Self::arrive), and all that arrive later, fail
    /// with [`Error::Aborted`].
    pub fn abort(&self) {
        if !self.aborted.is_cancelled() {
            tracing::warn!("aborting load rendezvous");
        }
        self.aborted.cancel();
    }

    /// Returns `true` if the rendezvous has been aborted.
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_cancelled()
    }

    /// Waits until all workers have arrived.
    ///
    /// The last arriving worker releases all others at once.
    pub async fn arrive(&self) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.aborted.cancelled() => Err(Error::Aborted),
            result = self.barrier.wait() => {
                if result.is_leader() {
                    tracing::debug!(workers = self.workers, "all workers arrived");
                }
                Ok(())
            }
        }
    }

    /// Runs `publish` unless another worker already did.
    ///
    /// The publication state is checked and updated under a lock, so `publish` runs at most once
    /// per rendezvous. The worker that runs it receives the reference token it returns, all other
    /// workers receive `None`. If `publish` fails, the rendezvous is aborted and every worker
    /// checking afterwards receives [`Error::PublishFailed`].
    pub async fn publish_once<F, Fut>(&self, publish: F) -> Result<Option<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let mut publication = self.publication.lock().await;
        match *publication {
            Publication::Pending => (),
            Publication::Published(_) => return Ok(None),
            Publication::Failed => return Err(Error::PublishFailed),
        }

        tracing::debug!("elected to publish the key mapping");
        match publish().await {
            Ok(token) => {
                *publication = Publication::Published(token.clone());
                Ok(Some(token))
            }
            Err(err) => {
                *publication = Publication::Failed;
                self.abort();
                Err(err)
            }
        }
    }

    /// Waits for all workers, then publishes once.
    ///
    /// This is [`arrive`](Self::arrive) followed by [`publish_once`](Self::publish_once).
    pub async fn complete<F, Fut>(&self, publish: F) -> Result<Option<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        self.arrive().await?;
        self.publish_once(publish).await
    }

    /// Returns the current publication state.
    pub async fn publication(&self) -> Publication {
        self.publication.lock().await.clone()
    }
}
