//! Job persistence across two independent stores.
//!
//! The state store holds the current record for each job and is the only
//! one read to make decisions. The log store mirrors a relational row per
//! job and keeps the append-only audit trail. Writes go state first, then
//! log, with no shared transaction; log failures are logged and dropped.

pub mod adapters;
pub mod error;
pub mod job_store;
pub mod memory;
pub mod traits;

pub use adapters::PgLogStore;
pub use error::{StoreError, StoreResult};
pub use job_store::{JobPage, JobStore, Transition};
pub use memory::{MemoryLogStore, MemoryStateStore};
pub use traits::{LogStore, StateStore};
