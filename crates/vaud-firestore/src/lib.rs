//! Firestore REST API client.
//!
//! This crate provides:
//! - The authoritative job state repository
//! - Service account authentication via gcp_auth, or the local emulator
//! - Structured and aggregation queries
//! - Retry with jittered backoff, tracing spans and request metrics

pub mod client;
pub mod error;
pub mod job_repo;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;


pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use job_repo::JobRepository;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
