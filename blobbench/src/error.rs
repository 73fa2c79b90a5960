//! Fatal errors of a benchmark phase.
//!
//! Per-operation failures are never reported through [`Error`]. They are classified into a
//! [`Status`](crate::Status) and counted instead. The errors in this module abort the whole load
//! or run phase.

use thiserror::Error;

/// Errors that abort a benchmark phase.
#[derive(Debug, Error)]
pub enum Error {
    /// Run mode was requested without a mapping id.
    #[error("missing mapping id, pass `--mapping-id` or set `mapping_id`")]
    MissingMappingId,

    /// The configured workload cannot be sampled from.
    #[error("invalid workload: {0}")]
    InvalidWorkload(String),

    /// The store did not pass its health check.
    #[error("store at {url} is not healthy: {source}")]
    Unhealthy {
        /// The base URL of the store.
        url: String,
        /// The underlying client error.
        #[source]
        source: blobbench_client::Error,
    },

    /// The published key mapping could not be fetched.
    #[error("invalid mapping id `{token}`: {source}")]
    MappingUnavailable {
        /// The mapping id passed to the run phase.
        token: String,
        /// The underlying client error.
        #[source]
        source: blobbench_client::Error,
    },

    /// The published key mapping could be fetched, but not decoded.
    #[error("mapping `{token}` is not a valid key mapping: {source}")]
    InvalidMapping {
        /// The mapping id passed to the run phase.
        token: String,
        /// The decoding error.
        #[source]
        source: serde_json::Error,
    },

    /// The key mapping was already loaded from a different mapping id.
    #[error("mapping already loaded from `{loaded}`, refusing to load `{requested}`")]
    MappingConflict {
        /// The mapping id the process loaded.
        loaded: String,
        /// The mapping id that was requested afterwards.
        requested: String,
    },

    /// Loading the key mapping failed in another worker.
    #[error("loading the key mapping failed in another worker")]
    BootstrapFailed,

    /// Another worker failed fatally while this worker waited at the rendezvous.
    #[error("load run aborted before all workers arrived")]
    Aborted,

    /// The key mapping could not be serialized.
    #[error("failed to encode key mapping: {0}")]
    EncodeMapping(#[source] serde_json::Error),

    /// The store rejected the key mapping.
    #[error("failed to publish key mapping: {0}")]
    Publish(#[source] blobbench_client::Error),

    /// Publishing the key mapping failed in another worker.
    #[error("publishing the key mapping failed in another worker")]
    PublishFailed,

    /// A worker task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    /// Writing a report failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` for errors caused by configuration that must be fixed by the operator.
    ///
    /// These abort process startup and are never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::MissingMappingId
                | Error::InvalidWorkload(_)
                | Error::Unhealthy { .. }
                | Error::MappingUnavailable { .. }
                | Error::InvalidMapping { .. }
                | Error::MappingConflict { .. }
                | Error::BootstrapFailed
        )
    }

    /// Returns `true` for errors that broke the rendezvous of a load run.
    pub fn is_coordination(&self) -> bool {
        matches!(
            self,
            Error::Aborted | Error::EncodeMapping(_) | Error::Publish(_) | Error::PublishFailed
        )
    }
}

/// A convenience alias that defaults our [`Error`] type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
