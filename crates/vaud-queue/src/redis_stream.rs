//! Task queue on Redis Streams.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadReply};
use tracing::{debug, info, warn};

use vaud_models::TaskDescriptor;

use crate::broker::{ConsumerSession, Delivery, TaskBroker, TaskPublisher};
use crate::error::{QueueError, QueueResult};

/// Stream field holding the serialized task.
const PAYLOAD_FIELD: &str = "job";

/// How many pending entries are inspected per claim pass.
const CLAIM_SCAN_COUNT: usize = 10;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for tasks
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// How long one poll blocks waiting for a new entry
    pub block_timeout: Duration,
    /// Entries idle longer than this on another consumer are claimed
    pub claim_min_idle: Duration,
    /// How often a session looks for abandoned entries
    pub claim_interval: Duration,
    /// How often an entry being processed is renewed so it never looks idle
    pub keep_alive_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "vaud:conversions".to_string(),
            consumer_group: "vaud:workers".to_string(),
            block_timeout: Duration::from_secs(5),
            claim_min_idle: Duration::from_secs(600),
            claim_interval: Duration::from_secs(60),
            keep_alive_interval: Duration::from_secs(60),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or(defaults.consumer_group),
            block_timeout: std::env::var("QUEUE_BLOCK_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.block_timeout),
            claim_min_idle: secs("QUEUE_CLAIM_MIN_IDLE_SECS", defaults.claim_min_idle),
            claim_interval: secs("QUEUE_CLAIM_INTERVAL_SECS", defaults.claim_interval),
            keep_alive_interval: secs("QUEUE_KEEPALIVE_SECS", defaults.keep_alive_interval),
        }
    }

    /// Renewal period actually used.
    ///
    /// Capped at half of `claim_min_idle` so a renewed entry never crosses
    /// the claim threshold between two renewals.
    pub fn effective_keep_alive(&self) -> Duration {
        let ceiling = self.claim_min_idle / 2;
        if self.keep_alive_interval.is_zero() || self.keep_alive_interval > ceiling {
            ceiling
        } else {
            self.keep_alive_interval
        }
    }
}

/// Redis Streams broker.
pub struct RedisBroker {
    client: redis::Client,
    config: QueueConfig,
}

impl RedisBroker {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    async fn connect(&self) -> QueueResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))
    }

    /// Create the stream and consumer group if missing.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.connect().await?;
        ensure_group(&mut conn, &self.config).await
    }

    /// Number of entries currently in the stream.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.connect().await?;
        let len: u64 = redis::cmd("XLEN")
            .arg(&self.config.stream_name)
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }
}

async fn ensure_group(conn: &mut MultiplexedConnection, config: &QueueConfig) -> QueueResult<()> {
    // From "0" so entries published before the group existed are not skipped.
    let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
        .arg("CREATE")
        .arg(&config.stream_name)
        .arg(&config.consumer_group)
        .arg("0")
        .arg("MKSTREAM")
        .query_async(conn)
        .await;

    match result {
        Ok(()) => info!("Created consumer group: {}", config.consumer_group),
        Err(e) if e.code() == Some("BUSYGROUP") => {
            debug!("Consumer group already exists: {}", config.consumer_group);
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

#[async_trait]
impl TaskPublisher for RedisBroker {
    async fn publish(&self, task: &TaskDescriptor) -> QueueResult<String> {
        let payload = task.to_json()?;
        let mut conn = self.connect().await?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg(PAYLOAD_FIELD)
            .arg(&payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::publish_failed(e.to_string()))?;

        info!("Enqueued job {} with message ID {}", task.job_id, message_id);
        Ok(message_id)
    }
}

#[async_trait]
impl TaskBroker for RedisBroker {
    type Session = RedisSession;

    async fn open_session(&self, consumer: &str) -> QueueResult<RedisSession> {
        let mut conn = self.connect().await?;
        ensure_group(&mut conn, &self.config).await?;
        info!(
            "Consumer {} joined group {} on {}",
            consumer, self.config.consumer_group, self.config.stream_name
        );

        Ok(RedisSession {
            conn,
            config: self.config.clone(),
            consumer: consumer.to_string(),
            replaying: true,
            last_claim: None,
        })
    }
}

/// A consumer session over one multiplexed connection.
pub struct RedisSession {
    conn: MultiplexedConnection,
    config: QueueConfig,
    consumer: String,
    /// Still draining this consumer's own pending list
    replaying: bool,
    last_claim: Option<Instant>,
}

impl RedisSession {
    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    /// `XREADGROUP ... COUNT 1`. `">"` reads new entries, `"0"` replays our
    /// own pending ones.
    async fn read_one(&mut self, start: &str, block: Option<Duration>) -> QueueResult<Option<StreamId>> {
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.consumer)
            .arg("COUNT")
            .arg(1);
        if let Some(block) = block {
            cmd.arg("BLOCK").arg(block.as_millis() as u64);
        }
        cmd.arg("STREAMS").arg(&self.config.stream_name).arg(start);

        let reply: Option<StreamReadReply> = cmd.query_async(&mut self.conn).await?;
        Ok(reply
            .into_iter()
            .flat_map(|r| r.keys)
            .flat_map(|k| k.ids)
            .next())
    }

    fn claim_due(&self) -> bool {
        self.last_claim
            .map_or(true, |at| at.elapsed() >= self.config.claim_interval)
    }

    /// Take over one entry another consumer left idle too long.
    async fn claim_idle(&mut self) -> QueueResult<Option<StreamId>> {
        self.last_claim = Some(Instant::now());
        let min_idle_ms = self.config.claim_min_idle.as_millis() as u64;

        let pending: StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("-")
            .arg("+")
            .arg(CLAIM_SCAN_COUNT)
            .query_async(&mut self.conn)
            .await?;

        for candidate in pending.ids {
            if candidate.consumer == self.consumer || (candidate.last_delivered_ms as u64) < min_idle_ms {
                continue;
            }

            // XCLAIM re-checks the idle time, so a racing consumer cannot
            // steal an entry that was just picked up.
            let claimed: StreamClaimReply = redis::cmd("XCLAIM")
                .arg(&self.config.stream_name)
                .arg(&self.config.consumer_group)
                .arg(&self.consumer)
                .arg(min_idle_ms)
                .arg(&candidate.id)
                .query_async(&mut self.conn)
                .await?;

            if let Some(entry) = claimed.ids.into_iter().next() {
                info!(
                    "Claimed message {} from consumer {} (delivered {} times)",
                    entry.id, candidate.consumer, candidate.times_delivered
                );
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}

impl RedisSession {
    /// Consumer currently holding a pending entry.
    async fn pending_owner(&mut self, id: &str) -> QueueResult<Option<String>> {
        let pending: StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(id)
            .arg(id)
            .arg(1)
            .query_async(&mut self.conn)
            .await?;
        Ok(pending.ids.into_iter().next().map(|p| p.consumer))
    }
}

fn to_delivery(entry: StreamId, redelivered: bool) -> Delivery {
    let payload = entry.get::<Vec<u8>>(PAYLOAD_FIELD).unwrap_or_else(|| {
        // Entry deleted before being acked, or written by something else.
        warn!("Message {} has no {} field", entry.id, PAYLOAD_FIELD);
        Vec::new()
    });
    Delivery {
        id: entry.id,
        payload,
        redelivered,
    }
}

#[async_trait]
impl ConsumerSession for RedisSession {
    async fn next_delivery(&mut self) -> QueueResult<Option<Delivery>> {
        if self.replaying {
            match self.read_one("0", None).await? {
                Some(entry) => {
                    info!("Replaying pending message {} for {}", entry.id, self.consumer);
                    return Ok(Some(to_delivery(entry, true)));
                }
                None => self.replaying = false,
            }
        }

        if self.claim_due() {
            if let Some(entry) = self.claim_idle().await? {
                return Ok(Some(to_delivery(entry, true)));
            }
        }

        let block = self.config.block_timeout;
        Ok(self
            .read_one(">", Some(block))
            .await?
            .map(|entry| to_delivery(entry, false)))
    }

    fn keep_alive_interval(&self) -> Option<Duration> {
        Some(self.config.effective_keep_alive())
    }

    /// `XCLAIM ... 0 <id> JUSTID` onto ourselves resets the entry's idle
    /// time without bumping its delivery count.
    async fn keep_alive(&mut self, delivery: &Delivery) -> QueueResult<()> {
        let owner = self.pending_owner(&delivery.id).await?;
        match owner.as_deref() {
            Some(owner) if owner == self.consumer => {}
            Some(owner) => {
                warn!(
                    "Message {} was claimed by {} while {} was processing it",
                    delivery.id, owner, self.consumer
                );
                return Ok(());
            }
            None => {
                debug!("Message {} is no longer pending", delivery.id);
                return Ok(());
            }
        }

        let _: Vec<String> = redis::cmd("XCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(&self.consumer)
            .arg(0)
            .arg(&delivery.id)
            .arg("JUSTID")
            .query_async(&mut self.conn)
            .await?;

        debug!("Renewed message {} for {}", delivery.id, self.consumer);
        Ok(())
    }

    async fn ack(&mut self, delivery: &Delivery) -> QueueResult<()> {
        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(&delivery.id)
            .query_async::<()>(&mut self.conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(&delivery.id)
            .query_async::<()>(&mut self.conn)
            .await?;

        debug!("Acknowledged message: {}", delivery.id);
        Ok(())
    }
}
