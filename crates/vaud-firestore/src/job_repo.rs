//! Job state repository.
//!
//! One document per job in a root collection, keyed by job id.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use vaud_models::{Job, JobId, JobStatus};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{Document, FromFirestoreValue, StructuredQuery, ToFirestoreValue, Value};

/// Default collection for job documents.
pub const DEFAULT_COLLECTION: &str = "jobs";

/// Repository for job documents.
#[derive(Clone)]
pub struct JobRepository {
    client: FirestoreClient,
    collection: String,
}

impl JobRepository {
    pub fn new(client: FirestoreClient, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }

    /// Collection from `FIRESTORE_COLLECTION`, defaulting to `jobs`.
    pub fn from_env(client: FirestoreClient) -> Self {
        let collection = std::env::var("FIRESTORE_COLLECTION")
            .ok()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string());
        Self::new(client, collection)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Get a job by ID.
    pub async fn get(&self, job_id: &JobId) -> FirestoreResult<Option<Job>> {
        match self.client.get_document(&self.collection, job_id.as_str()).await? {
            Some(doc) => document_to_job(&doc, job_id).map(Some),
            None => Ok(None),
        }
    }

    /// Write the full job record, replacing any previous version.
    pub async fn upsert(&self, job: &Job) -> FirestoreResult<()> {
        self.client
            .set_document(&self.collection, job.job_id.as_str(), job_to_fields(job))
            .await?;
        debug!("Upserted job {} ({})", job.job_id, job.status);
        Ok(())
    }

    /// Newest jobs first.
    pub async fn list_recent(&self, limit: u32, skip: u32) -> FirestoreResult<Vec<Job>> {
        let query = StructuredQuery::collection(&self.collection)
            .order_by_desc("created_at")
            .page(to_i32(skip), to_i32(limit));

        self.client
            .run_query(query)
            .await?
            .iter()
            .map(|doc| {
                let id = doc
                    .name
                    .as_deref()
                    .and_then(|n| n.rsplit('/').next())
                    .map(JobId::from_string)
                    .ok_or_else(|| FirestoreError::invalid_response("query result without name"))?;
                document_to_job(doc, &id)
            })
            .collect()
    }

    /// Total number of jobs.
    pub async fn count(&self) -> FirestoreResult<u64> {
        self.client.count(&self.collection).await
    }
}

fn to_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Serialize a job. Unset optional fields are omitted entirely.
fn job_to_fields(job: &Job) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("job_id".to_string(), job.job_id.as_str().to_firestore_value());
    fields.insert("status".to_string(), job.status.as_str().to_firestore_value());
    fields.insert("input_ref".to_string(), job.input_ref.to_firestore_value());
    fields.insert(
        "original_filename".to_string(),
        job.original_filename.to_firestore_value(),
    );
    fields.insert("created_at".to_string(), job.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), job.updated_at.to_firestore_value());

    let optional: [(&str, Option<Value>); 7] = [
        ("content_type", job.content_type.as_ref().map(|v| v.to_firestore_value())),
        ("input_size", job.input_size.map(|v| v.to_firestore_value())),
        ("owner", job.owner.as_ref().map(|v| v.to_firestore_value())),
        ("output_ref", job.output_ref.as_ref().map(|v| v.to_firestore_value())),
        ("output_size", job.output_size.map(|v| v.to_firestore_value())),
        ("error", job.error.as_ref().map(|v| v.to_firestore_value())),
        ("completed_at", job.completed_at.map(|v| v.to_firestore_value())),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            fields.insert(key.to_string(), value);
        }
    }

    fields
}

fn document_to_job(doc: &Document, job_id: &JobId) -> FirestoreResult<Job> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| FirestoreError::invalid_response("Document has no fields"))?;

    let get_string = |key: &str| fields.get(key).and_then(String::from_firestore_value);
    let get_u64 = |key: &str| fields.get(key).and_then(u64::from_firestore_value);
    let get_time = |key: &str| fields.get(key).and_then(DateTime::<Utc>::from_firestore_value);

    let status: JobStatus = get_string("status")
        .ok_or_else(|| FirestoreError::invalid_response(format!("job {} has no status", job_id)))?
        .parse()
        .map_err(FirestoreError::InvalidResponse)?;
    let created_at = get_time("created_at").unwrap_or_else(Utc::now);

    Ok(Job {
        job_id: job_id.clone(),
        status,
        input_ref: get_string("input_ref").unwrap_or_default(),
        original_filename: get_string("original_filename").unwrap_or_default(),
        content_type: get_string("content_type"),
        input_size: get_u64("input_size"),
        owner: get_string("owner"),
        output_ref: get_string("output_ref"),
        output_size: get_u64("output_size"),
        error: get_string("error"),
        created_at,
        updated_at: get_time("updated_at").unwrap_or(created_at),
        completed_at: get_time("completed_at"),
    })
}
