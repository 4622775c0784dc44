//! Durable task queue.
//!
//! This crate provides:
//! - Publishing task descriptors to a Redis Stream
//! - Consumer sessions with prefetch 1 and explicit acknowledgement
//! - Redelivery of unacknowledged messages after a consumer dies
//! - An in-memory broker with the same delivery semantics

pub mod broker;
pub mod error;
pub mod memory;
pub mod redis_stream;

pub use broker::{ConsumerSession, Delivery, TaskBroker, TaskPublisher};
pub use error::{QueueError, QueueResult};
pub use memory::{MemoryBroker, MemorySession};
pub use redis_stream::{QueueConfig, RedisBroker, RedisSession};
