//! Test utilities for blobbench and its clients.
//!
//! This crate provides utilities to facilitate testing of blobbench against blob stores. See the
//! modules for all available utilities.

pub mod server;
pub mod tracing;
