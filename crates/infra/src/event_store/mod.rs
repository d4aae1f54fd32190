//! Append-only event store boundary.
//!
//! Purchase order streams are stored here, keyed by `(tenant_id, aggregate_id)`. The
//! store is the single commit point of every write: a receipt, a payment or a status
//! change is durable exactly when its append succeeds.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent, stream_version};
