//! Broker seams shared by the Redis and in-memory implementations.

use std::time::Duration;

use async_trait::async_trait;

use vaud_models::TaskDescriptor;

use crate::error::{QueueError, QueueResult};

/// A message handed to a consumer.
///
/// It stays pending on the broker until acknowledged through the session that
/// received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-assigned message id
    pub id: String,
    /// Raw message body
    pub payload: Vec<u8>,
    /// Set when the message was delivered before and never acknowledged
    pub redelivered: bool,
}

impl Delivery {
    /// Decode the task descriptor carried by this message.
    pub fn decode(&self) -> QueueResult<TaskDescriptor> {
        TaskDescriptor::from_slice(&self.payload).map_err(|e| QueueError::Malformed(e.to_string()))
    }
}

/// Producer side of the queue.
#[async_trait]
pub trait TaskPublisher: Send + Sync {
    /// Durably enqueue a task. Returns the message id.
    async fn publish(&self, task: &TaskDescriptor) -> QueueResult<String>;
}

/// Consumer side of the queue.
#[async_trait]
pub trait TaskBroker: Send + Sync {
    type Session: ConsumerSession;

    /// Connect and join the consumer group under `consumer`.
    async fn open_session(&self, consumer: &str) -> QueueResult<Self::Session>;
}

/// One connected consumer.
///
/// Dropping a session without acking leaves its in-flight message pending for
/// redelivery.
#[async_trait]
pub trait ConsumerSession: Send {
    /// Wait for the next message. `Ok(None)` means the poll timed out.
    async fn next_delivery(&mut self) -> QueueResult<Option<Delivery>>;

    /// Acknowledge and remove a message.
    async fn ack(&mut self, delivery: &Delivery) -> QueueResult<()>;

    /// How often an unacknowledged delivery must be renewed with
    /// [`keep_alive`](Self::keep_alive) while it is being processed.
    /// `None` when the broker never reassigns live deliveries.
    fn keep_alive_interval(&self) -> Option<Duration> {
        None
    }

    /// Mark a delivery as still being worked on, so idle-entry recovery
    /// does not hand it to another consumer.
    async fn keep_alive(&mut self, _delivery: &Delivery) -> QueueResult<()> {
        Ok(())
    }
}
