//! In-process broker with at-least-once delivery.
//!
//! Unacknowledged messages go back to the front of the queue when the session
//! holding them is dropped, the same way a broker redelivers after a consumer
//! disconnects.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::debug;

use vaud_models::TaskDescriptor;

use crate::broker::{ConsumerSession, Delivery, TaskBroker, TaskPublisher};
use crate::error::{QueueError, QueueResult};

#[derive(Debug, Clone)]
struct Message {
    id: String,
    payload: Vec<u8>,
    deliveries: u32,
}

#[derive(Debug, Default)]
struct Inner {
    ready: VecDeque<Message>,
    next_id: u64,
    acked: Vec<String>,
    /// Ids renewed through `keep_alive`, one entry per renewal.
    renewed: Vec<String>,
    /// Bumped by `break_sessions`; sessions from an older epoch are dead.
    epoch: u64,
    fail_opens: u32,
    fail_publish: bool,
    opened: u32,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared in-memory queue. Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<Mutex<Inner>>,
    notify: Arc<Notify>,
    poll_timeout: Duration,
    keep_alive: Option<Duration>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            inner: Arc::default(),
            notify: Arc::new(Notify::new()),
            poll_timeout: Duration::from_millis(100),
            keep_alive: None,
        }
    }

    /// Ask consumers to renew in-flight deliveries every `interval`.
    pub fn with_keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = Some(interval);
        self
    }

    /// Enqueue a raw body, bypassing serialization.
    pub fn push_raw(&self, payload: impl Into<Vec<u8>>) -> String {
        let id = {
            let mut inner = lock(&self.inner);
            inner.next_id += 1;
            let id = format!("{}-0", inner.next_id);
            inner.ready.push_back(Message {
                id: id.clone(),
                payload: payload.into(),
                deliveries: 0,
            });
            id
        };
        self.notify.notify_one();
        id
    }

    /// Make the next `n` calls to `open_session` fail with a transport error.
    pub fn fail_next_opens(&self, n: u32) {
        lock(&self.inner).fail_opens = n;
    }

    /// Make `publish` fail until reset.
    pub fn set_publish_failing(&self, failing: bool) {
        lock(&self.inner).fail_publish = failing;
    }

    /// Sever every live session, as if the connection dropped.
    pub fn break_sessions(&self) {
        lock(&self.inner).epoch += 1;
        self.notify.notify_waiters();
    }

    /// Messages waiting for delivery.
    pub fn ready_len(&self) -> usize {
        lock(&self.inner).ready.len()
    }

    /// Ids acknowledged so far, in order.
    pub fn acked(&self) -> Vec<String> {
        lock(&self.inner).acked.clone()
    }

    /// How many times `id` was renewed.
    pub fn renewals(&self, id: &str) -> usize {
        lock(&self.inner).renewed.iter().filter(|r| *r == id).count()
    }

    /// Successful `open_session` calls.
    pub fn sessions_opened(&self) -> u32 {
        lock(&self.inner).opened
    }
}

#[async_trait]
impl TaskPublisher for MemoryBroker {
    async fn publish(&self, task: &TaskDescriptor) -> QueueResult<String> {
        if lock(&self.inner).fail_publish {
            return Err(QueueError::publish_failed("broker unavailable"));
        }
        let payload = task.to_json()?;
        Ok(self.push_raw(payload))
    }
}

#[async_trait]
impl TaskBroker for MemoryBroker {
    type Session = MemorySession;

    async fn open_session(&self, consumer: &str) -> QueueResult<MemorySession> {
        let epoch = {
            let mut inner = lock(&self.inner);
            if inner.fail_opens > 0 {
                inner.fail_opens -= 1;
                return Err(QueueError::connection_failed("connection refused"));
            }
            inner.opened += 1;
            inner.epoch
        };
        debug!("Memory session opened for {}", consumer);

        Ok(MemorySession {
            inner: self.inner.clone(),
            notify: self.notify.clone(),
            poll_timeout: self.poll_timeout,
            keep_alive: self.keep_alive,
            epoch,
            in_flight: Vec::new(),
        })
    }
}

/// Session on a [`MemoryBroker`].
#[derive(Debug)]
pub struct MemorySession {
    inner: Arc<Mutex<Inner>>,
    notify: Arc<Notify>,
    poll_timeout: Duration,
    keep_alive: Option<Duration>,
    epoch: u64,
    in_flight: Vec<Message>,
}

impl MemorySession {
    fn try_take(&mut self) -> QueueResult<Option<Delivery>> {
        let mut inner = lock(&self.inner);
        if inner.epoch != self.epoch {
            return Err(QueueError::session_closed("connection reset"));
        }
        let Some(mut message) = inner.ready.pop_front() else {
            return Ok(None);
        };
        drop(inner);

        message.deliveries += 1;
        let delivery = Delivery {
            id: message.id.clone(),
            payload: message.payload.clone(),
            redelivered: message.deliveries > 1,
        };
        self.in_flight.push(message);
        Ok(Some(delivery))
    }
}

#[async_trait]
impl ConsumerSession for MemorySession {
    async fn next_delivery(&mut self) -> QueueResult<Option<Delivery>> {
        if let Some(delivery) = self.try_take()? {
            return Ok(Some(delivery));
        }
        let _ = tokio::time::timeout(self.poll_timeout, self.notify.notified()).await;
        self.try_take()
    }

    async fn ack(&mut self, delivery: &Delivery) -> QueueResult<()> {
        let mut inner = lock(&self.inner);
        if inner.epoch != self.epoch {
            return Err(QueueError::session_closed("connection reset"));
        }
        self.in_flight.retain(|m| m.id != delivery.id);
        inner.acked.push(delivery.id.clone());
        Ok(())
    }

    fn keep_alive_interval(&self) -> Option<Duration> {
        self.keep_alive
    }

    async fn keep_alive(&mut self, delivery: &Delivery) -> QueueResult<()> {
        let mut inner = lock(&self.inner);
        if inner.epoch != self.epoch {
            return Err(QueueError::session_closed("connection reset"));
        }
        if self.in_flight.iter().any(|m| m.id == delivery.id) {
            inner.renewed.push(delivery.id.clone());
        }
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if self.in_flight.is_empty() {
            return;
        }
        let mut inner = lock(&self.inner);
        for message in self.in_flight.drain(..).rev() {
            debug!("Requeueing unacked message {}", message.id);
            inner.ready.push_front(message);
        }
        drop(inner);
        self.notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaud_models::JobId;

    fn task(id: &str) -> TaskDescriptor {
        TaskDescriptor {
            job_id: JobId::from_string(id),
            input_ref: format!("/in/{}.mp4", id),
            original_name: "clip.mp4".into(),
            owner: None,
        }
    }

    #[tokio::test]
    async fn test_publish_then_consume() {
        let broker = MemoryBroker::new();
        broker.publish(&task("a")).await.unwrap();

        let mut session = broker.open_session("c1").await.unwrap();
        let delivery = session.next_delivery().await.unwrap().unwrap();
        assert_eq!(delivery.decode().unwrap().job_id.as_str(), "a");
        assert!(!delivery.redelivered);

        session.ack(&delivery).await.unwrap();
        drop(session);
        assert_eq!(broker.ready_len(), 0);
        assert_eq!(broker.acked(), [delivery.id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_poll_times_out() {
        let broker = MemoryBroker::new();
        let mut session = broker.open_session("c1").await.unwrap();
        assert!(session.next_delivery().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unacked_message_is_redelivered() {
        let broker = MemoryBroker::new();
        broker.publish(&task("a")).await.unwrap();
        broker.publish(&task("b")).await.unwrap();

        let mut session = broker.open_session("c1").await.unwrap();
        let first = session.next_delivery().await.unwrap().unwrap();
        drop(session);

        let mut session = broker.open_session("c2").await.unwrap();
        let again = session.next_delivery().await.unwrap().unwrap();
        assert_eq!(again.id, first.id);
        assert!(again.redelivered);
    }

    #[tokio::test]
    async fn test_broken_session_reports_transport_error() {
        let broker = MemoryBroker::new();
        let mut session = broker.open_session("c1").await.unwrap();
        broker.break_sessions();

        let err = session.next_delivery().await.unwrap_err();
        assert!(err.is_transport());
        // A fresh session works.
        assert!(broker.open_session("c1").await.is_ok());
    }

    #[tokio::test]
    async fn test_open_failures_are_transport_errors() {
        let broker = MemoryBroker::new();
        broker.fail_next_opens(2);

        assert!(broker.open_session("c1").await.unwrap_err().is_transport());
        assert!(broker.open_session("c1").await.is_err());
        assert!(broker.open_session("c1").await.is_ok());
        assert_eq!(broker.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn test_publish_failure() {
        let broker = MemoryBroker::new();
        broker.set_publish_failing(true);
        let err = broker.publish(&task("a")).await.unwrap_err();
        assert!(matches!(err, QueueError::PublishFailed(_)));
        assert_eq!(broker.ready_len(), 0);
    }

    #[tokio::test]
    async fn test_keep_alive_records_in_flight_only() {
        let broker = MemoryBroker::new().with_keep_alive(Duration::from_secs(1));
        broker.publish(&task("a")).await.unwrap();

        let mut session = broker.open_session("c1").await.unwrap();
        assert_eq!(session.keep_alive_interval(), Some(Duration::from_secs(1)));
        let delivery = session.next_delivery().await.unwrap().unwrap();

        session.keep_alive(&delivery).await.unwrap();
        session.ack(&delivery).await.unwrap();
        session.keep_alive(&delivery).await.unwrap();
        assert_eq!(broker.renewals(&delivery.id), 1);

        broker.break_sessions();
        assert!(session.keep_alive(&delivery).await.unwrap_err().is_transport());
    }
}
