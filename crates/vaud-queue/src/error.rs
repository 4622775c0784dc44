//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Session closed: {0}")]
    SessionClosed(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    pub fn session_closed(msg: impl Into<String>) -> Self {
        Self::SessionClosed(msg.into())
    }

    pub fn publish_failed(msg: impl Into<String>) -> Self {
        Self::PublishFailed(msg.into())
    }

    /// Whether the error means the broker link is gone.
    ///
    /// Transport errors abort the consume session; anything else is about a
    /// single message.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::ConnectionFailed(_) | Self::SessionClosed(_) => true,
            Self::Redis(e) => {
                e.is_io_error()
                    || e.is_connection_dropped()
                    || e.is_connection_refusal()
                    || e.is_timeout()
            }
            Self::PublishFailed(_) | Self::Malformed(_) | Self::Json(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(QueueError::connection_failed("refused").is_transport());
        assert!(QueueError::session_closed("reset").is_transport());
        assert!(!QueueError::publish_failed("full").is_transport());
        assert!(!QueueError::Malformed("not json".into()).is_transport());

        let io = redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert!(QueueError::Redis(io).is_transport());
    }
}
