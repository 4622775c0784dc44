//! Axum HTTP API server.
//!
//! This crate provides:
//! - Upload submission into the conversion queue
//! - Job status queries
//! - Artifact download
//! - Security headers, request ids and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{JobSubmitter, ResultRetriever};
pub use state::AppState;
