//! Submission through the router, conversion by a worker, retrieval through the router.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use tokio::sync::watch;
use tower::ServiceExt;

use vaud_api::{create_router, ApiConfig, AppState};
use vaud_media::{ConversionEngine, ConversionOutput, MediaError, MediaResult};
use vaud_models::{AudioCodec, ConversionSettings, JobId, JobStatus};
use vaud_queue::MemoryBroker;
use vaud_storage::{AssetStorage, StorageConfig};
use vaud_store::{JobStore, MemoryLogStore, MemoryStateStore};
use vaud_worker::{JobProcessor, JobWorker, WorkerConfig};

const BOUNDARY: &str = "vaud-pipeline-boundary";

/// Writes the input's bytes reversed as the "audio".
struct ReversingEngine;

#[async_trait]
impl ConversionEngine for ReversingEngine {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        _settings: &ConversionSettings,
    ) -> MediaResult<ConversionOutput> {
        let mut data = tokio::fs::read(input)
            .await
            .map_err(|_| MediaError::FileNotFound(input.to_path_buf()))?;
        data.reverse();
        data.extend_from_slice(b"-audio");
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output, &data).await?;
        Ok(ConversionOutput {
            exit_code: 0,
            output_path: output.to_path_buf(),
            output_size: data.len() as u64,
        })
    }
}

fn upload_request(file_name: &str, data: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: video/mp4\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_upload_convert_download() {
    let dir = tempfile::tempdir().unwrap();
    let storage = AssetStorage::new(StorageConfig {
        upload_dir: dir.path().join("uploads"),
        output_dir: dir.path().join("outputs"),
    });
    let state = Arc::new(MemoryStateStore::new());
    let store = JobStore::new(state.clone(), Arc::new(MemoryLogStore::new()));
    let broker = MemoryBroker::new();

    let router = create_router(
        AppState::new(
            ApiConfig::default(),
            store.clone(),
            Arc::new(broker.clone()),
            storage.clone(),
        ),
        None,
    );

    let processor = JobProcessor::new(
        store.clone(),
        Arc::new(ReversingEngine),
        storage,
        ConversionSettings::new(AudioCodec::Mp3, 2),
    );
    let worker = JobWorker::new(
        broker.clone(),
        processor,
        WorkerConfig {
            consumer_name: "pipeline-worker".into(),
            ..WorkerConfig::default()
        },
    );
    let (shutdown, rx) = watch::channel(false);
    let handle = tokio::spawn(async move { worker.run(rx).await.unwrap() });

    let response = router
        .clone()
        .oneshot(upload_request("talk.mp4", b"0123456789"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    let job_id = JobId::from_string(json["job_id"].as_str().unwrap());

    let mut completed = None;
    for _ in 0..200 {
        if let Some(job) = store.get(&job_id).await.unwrap() {
            if job.status == JobStatus::Completed {
                completed = Some(job);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    let job = completed.expect("job did not complete");

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/download/{}", job_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    let audio = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    assert_eq!(Some(audio.len() as u64), job.output_size);
    assert_eq!(&audio[..], b"9876543210-audio");

    shutdown.send(true).unwrap();
    handle.await.unwrap();
}
