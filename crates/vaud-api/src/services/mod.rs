//! Submission and retrieval services.

pub mod retriever;
pub mod submitter;

pub use retriever::{Artifact, ResultRetriever, RetrieveError};
pub use submitter::{JobSubmitter, SubmitError, Submission};
