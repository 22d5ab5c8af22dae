//! Test helpers for sequencer and listing tests
//!
//! An in-memory `DocumentStore` that follows the store's revision rules and records
//! every call, a reporter that records what it is told, and on-disk video fixtures.
//! No database or network is needed.

pub mod fixtures;
pub mod memory_store;

pub use fixtures::*;
pub use memory_store::{InMemoryStore, RecordedCall};
