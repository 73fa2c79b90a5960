//! Benchmark harness for content-addressable blob stores.
//!
//! A benchmark consists of two phases. `blobbench load` inserts records and publishes the mapping
//! of record keys to store locators as a blob of its own. `blobbench run --mapping-id <token>`
//! loads that mapping and runs reads and deletes against the loaded records.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

fn main() -> anyhow::Result<()> {
    blobbench::cli::execute()
}
