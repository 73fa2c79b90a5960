//! The Store Gateway
//!
//! The Client issues single HTTP operations against a content-addressable blob store and
//! classifies every response into a success value or a typed [`Error`].
//!
//! Stores assign an opaque locator to each object at creation time, returned in the `Location`
//! header. That locator is required to later [`fetch`](Client::fetch) or
//! [`delete`](Client::delete) the object. The client performs no retries; retry policies are a
//! caller concern.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod client;
mod delete;
mod error;
mod flavor;
mod get;
mod put;

pub use reqwest::StatusCode;

pub use client::*;
pub use error::*;
pub use flavor::*;

#[cfg(test)]
mod tests;
