//! vidpair Store Library
//!
//! This crate provides the document store abstraction used by the upload sequencer and
//! the listing, and an HTTP implementation for CouchDB-compatible databases.
//!
//! # Revisions
//!
//! Every mutating call carries the revision the caller last saw and yields the next one.
//! The store enforces optimistic concurrency: a stale revision is reported as
//! [`StoreError::Conflict`], never silently overwritten.

pub mod couch;
pub mod factory;
pub(crate) mod paths;
pub mod traits;

// Re-export commonly used types
pub use couch::CouchStore;
pub use factory::create_store;
pub use traits::{
    DocumentRow, DocumentStore, NoopObserver, StoreError, StoreResult, TransferObserver,
};
