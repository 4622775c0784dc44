//! Consume loop.

use std::time::Instant;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use vaud_models::TaskDescriptor;
use vaud_queue::{ConsumerSession, Delivery, TaskBroker};

use crate::backoff::ReconnectBackoff;
use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::metrics;
use crate::processor::{JobOutcome, JobProcessor};

/// Pulls tasks one at a time and runs them through a [`JobProcessor`].
///
/// A lost session is reopened after a backoff delay. Shutdown drops the
/// current session, so an in-flight message stays unacknowledged and is
/// redelivered later.
pub struct JobWorker<B: TaskBroker> {
    broker: B,
    processor: JobProcessor,
    config: WorkerConfig,
}

impl<B: TaskBroker> JobWorker<B> {
    pub fn new(broker: B, processor: JobProcessor, config: WorkerConfig) -> Self {
        Self {
            broker,
            processor,
            config,
        }
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> WorkerResult<()> {
        info!("Starting worker '{}'", self.config.consumer_name);
        let mut backoff =
            ReconnectBackoff::new(self.config.reconnect_initial, self.config.reconnect_max);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let result = tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break,
                result = self.run_session(&mut backoff) => result,
            };

            if let Err(e) = result {
                let delay = backoff.next_delay();
                if e.is_persistence() {
                    error!("Store failure, abandoning session: {}", e);
                } else if e.is_transport() {
                    warn!("Queue session lost: {}", e);
                } else {
                    // Reachable broker refusing our commands, e.g. a deleted group.
                    error!("Queue fault, reopening session: {}", e);
                }
                metrics::record_reconnect();
                info!("Reconnecting in {}s", delay.as_secs());

                tokio::select! {
                    _ = wait_for_shutdown(&mut shutdown) => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        info!("Worker '{}' stopped", self.config.consumer_name);
        Ok(())
    }

    /// One broker session. Only returns on error.
    async fn run_session(&self, backoff: &mut ReconnectBackoff) -> WorkerResult<()> {
        let mut session = self.broker.open_session(&self.config.consumer_name).await?;
        let mut polled = false;

        loop {
            let delivery = session.next_delivery().await?;
            if !polled {
                polled = true;
                backoff.reset();
            }

            match delivery {
                Some(delivery) => self.handle(&mut session, delivery).await?,
                None => debug!("No messages"),
            }
        }
    }

    async fn handle(&self, session: &mut B::Session, delivery: Delivery) -> WorkerResult<()> {
        let task = match delivery.decode() {
            Ok(task) => task,
            Err(e) => {
                warn!("Discarding message {}: {}", delivery.id, e);
                session.ack(&delivery).await?;
                metrics::record_malformed();
                return Ok(());
            }
        };

        if delivery.redelivered {
            info!("Message {} for job {} is a redelivery", delivery.id, task.job_id);
        }

        let started = Instant::now();
        let outcome = self.process_owned(session, &delivery, &task).await?;
        metrics::record_outcome(&outcome, started.elapsed());

        session.ack(&delivery).await?;
        debug!("Job {} finished as {:?}", task.job_id, outcome);
        Ok(())
    }

    /// Process a task while renewing its delivery, so a long conversion is
    /// never mistaken for an abandoned message.
    ///
    /// A failed renewal is only logged. The conversion keeps running and a
    /// dead link surfaces at ack time.
    async fn process_owned(
        &self,
        session: &mut B::Session,
        delivery: &Delivery,
        task: &TaskDescriptor,
    ) -> WorkerResult<JobOutcome> {
        let process = self.processor.process(task, &self.config.consumer_name);
        let Some(every) = session.keep_alive_interval() else {
            return process.await;
        };
        tokio::pin!(process);

        let mut renew = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        renew.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                outcome = &mut process => return outcome,
                _ = renew.tick() => {
                    if let Err(e) = session.keep_alive(delivery).await {
                        warn!("Failed to renew message {}: {}", delivery.id, e);
                    }
                }
            }
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also means stop.
    let _ = shutdown.wait_for(|stop| *stop).await;
}
