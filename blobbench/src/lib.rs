//! Benchmark harness for content-addressable blob stores.
//!
//! Blob stores assign an opaque locator to every object when it is created, so a benchmark cannot
//! address its records by their own keys. During the *load* phase, every worker inserts its share
//! of records and remembers the locators in a shared [`MappingStore`]. Once all workers are done,
//! exactly one of them publishes the mapping as a blob and prints its locator, the *mapping id*.
//!
//! The *run* phase starts from that mapping id. The first worker to initialize fetches and decodes
//! the mapping, all others wait until it is complete. Reads and deletes then resolve record keys
//! through the mapping.
//!
//! The [`Runner`] drives a phase with a fixed number of workers and collects [`Measurements`],
//! which are exported as a terminal report or CSV.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod binding;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod healthcheck;
pub mod mapping;
pub mod measurements;
pub mod observability;
pub mod remote;
pub mod rendezvous;
pub mod runner;
pub mod status;
pub mod workload;

pub use crate::binding::{Binding, Harness, Phase, Record};
pub use crate::error::{Error, Result};
pub use crate::mapping::MappingStore;
pub use crate::measurements::Measurements;
pub use crate::runner::{Report, Runner};
pub use crate::status::Status;
pub use crate::workload::Workload;
