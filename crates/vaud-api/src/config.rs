//! API configuration.

use vaud_models::AudioCodec;

/// Default upload ceiling: 500 MiB.
const DEFAULT_MAX_UPLOAD_BYTES: usize = 500 * 1024 * 1024;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size for uploads
    pub max_upload_bytes: usize,
    /// Codec the workers produce; fixes download naming and content type
    pub output_codec: AudioCodec,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            output_codec: AudioCodec::default(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            output_codec: std::env::var("OUTPUT_CODEC")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
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
        std::env::set_var("API_PORT", "9001");
        std::env::set_var("CORS_ORIGINS", "http://a.test, http://b.test");
        std::env::set_var("OUTPUT_CODEC", "copy");
        std::env::remove_var("MAX_UPLOAD_BYTES");

        let config = ApiConfig::from_env();
        assert_eq!(config.port, 9001);
        assert_eq!(config.cors_origins, ["http://a.test", "http://b.test"]);
        assert_eq!(config.output_codec, AudioCodec::Copy);
        assert_eq!(config.max_upload_bytes, 500 * 1024 * 1024);

        std::env::remove_var("API_PORT");
        std::env::remove_var("CORS_ORIGINS");
        std::env::remove_var("OUTPUT_CODEC");
    }
}
