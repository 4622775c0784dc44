//! Worker configuration.

use std::time::Duration;

use uuid::Uuid;
use vaud_models::{AudioCodec, ConversionSettings};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Consumer name within the queue's consumer group
    pub consumer_name: String,
    /// First reconnect delay after a lost session
    pub reconnect_initial: Duration,
    /// Reconnect delay ceiling
    pub reconnect_max: Duration,
    /// Port for the Prometheus listener, if any
    pub metrics_port: Option<u16>,
    /// FFmpeg binary name or path
    pub ffmpeg_bin: String,
    /// Output encoding
    pub settings: ConversionSettings,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            consumer_name: format!("worker-{}", Uuid::new_v4()),
            reconnect_initial: Duration::from_secs(2),
            reconnect_max: Duration::from_secs(30),
            metrics_port: None,
            ffmpeg_bin: "ffmpeg".to_string(),
            settings: ConversionSettings::new(AudioCodec::Mp3, ConversionSettings::DEFAULT_QUALITY),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let codec = std::env::var("OUTPUT_CODEC")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.settings.codec);
        let quality = std::env::var("OUTPUT_QUALITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.settings.quality);

        Self {
            consumer_name: std::env::var("WORKER_CONSUMER_NAME")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.consumer_name),
            reconnect_initial: Duration::from_secs(
                std::env::var("WORKER_RECONNECT_INITIAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            ),
            reconnect_max: Duration::from_secs(
                std::env::var("WORKER_RECONNECT_MAX_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            metrics_port: std::env::var("WORKER_METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
            ffmpeg_bin: std::env::var("FFMPEG_BIN").unwrap_or(defaults.ffmpeg_bin),
            settings: ConversionSettings::new(codec, quality),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var("WORKER_CONSUMER_NAME", "worker-a");
        std::env::set_var("OUTPUT_CODEC", "AAC");
        std::env::set_var("OUTPUT_QUALITY", "42");
        std::env::remove_var("WORKER_METRICS_PORT");

        let config = WorkerConfig::from_env();
        assert_eq!(config.consumer_name, "worker-a");
        assert_eq!(config.settings.codec, AudioCodec::Aac);
        assert_eq!(config.settings.quality, ConversionSettings::MAX_QUALITY);
        assert_eq!(config.reconnect_initial, Duration::from_secs(2));
        assert!(config.metrics_port.is_none());

        std::env::remove_var("WORKER_CONSUMER_NAME");
        std::env::remove_var("OUTPUT_CODEC");
        std::env::remove_var("OUTPUT_QUALITY");
    }

    #[test]
    #[serial]
    fn test_generated_consumer_name() {
        std::env::remove_var("WORKER_CONSUMER_NAME");
        let config = WorkerConfig::from_env();
        assert!(config.consumer_name.starts_with("worker-"));
    }
}
