//! Keyed-record store boundary.
//!
//! The engine assumes a durable store exists; this module only defines the
//! operations it needs and an in-memory implementation.

pub mod in_memory;
pub mod record_store;

pub use in_memory::InMemoryStore;
pub use record_store::{Mutation, RecordStore, StoreError, WriteBatch};
