// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::super::{router, test_state};
use axum::body::Body;
use axum::http::{Request as HttpRequest, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::tempdir;
use tower::ServiceExt;

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = HttpRequest::builder().method(method).uri(uri);
    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn create_compose_returns_id_and_waiting_status() {
    let dir = tempdir().unwrap();
    let app = router(test_state(dir.path()));

    let (status, body) = call(
        &app,
        "POST",
        "/composes",
        Some(json!({ "blueprint_name": "base", "compose_type": "qcow2" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = call(&app, "GET", &format!("/composes/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blueprint"], "base");
    assert_eq!(body["compose_type"], "qcow2");
    assert_eq!(body["queue_status"], "WAITING");
    assert_eq!(body["uploads"], json!([]));
}

#[tokio::test]
async fn create_compose_with_unknown_blueprint_is_400() {
    let dir = tempdir().unwrap();
    let app = router(test_state(dir.path()));

    let (status, body) = call(
        &app,
        "POST",
        "/composes",
        Some(json!({ "blueprint_name": "missing", "compose_type": "qcow2" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn create_compose_with_unknown_type_is_400() {
    let dir = tempdir().unwrap();
    let app = router(test_state(dir.path()));

    let (status, _) = call(
        &app,
        "POST",
        "/composes",
        Some(json!({ "blueprint_name": "base", "compose_type": "floppy" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_requests_become_targets() {
    let dir = tempdir().unwrap();
    let app = router(test_state(dir.path()));

    let (status, body) = call(
        &app,
        "POST",
        "/composes",
        Some(json!({
            "blueprint_name": "base",
            "compose_type": "ami",
            "upload": [{
                "provider": "aws",
                "image_name": "base-image",
                "settings": {
                    "region": "us-east-1",
                    "accessKeyID": "AKIA",
                    "secretAccessKey": "secret",
                    "bucket": "images",
                },
            }],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().unwrap().to_string();

    let (_, body) = call(&app, "GET", &format!("/composes/{id}"), None).await;
    assert_eq!(body["uploads"][0]["provider"], "org.kiln.aws");
    assert_eq!(body["uploads"][0]["image_name"], "base-image");
    assert_eq!(body["uploads"][0]["status"], "WAITING");
}

#[tokio::test]
async fn koji_upload_completes_through_its_registration_job() {
    let dir = tempdir().unwrap();
    let app = router(test_state(dir.path()));

    let (status, body) = call(
        &app,
        "POST",
        "/composes",
        Some(json!({
            "blueprint_name": "base",
            "compose_type": "qcow2",
            "upload": [{
                "provider": "koji",
                "image_name": "base-build",
                "settings": {
                    "server": "https://koji.example.com",
                    "upload_directory": "kiln",
                },
            }],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let compose = body["id"].as_str().unwrap().to_string();

    // The build finishing completes the compose, not the koji upload
    let (_, job_body) =
        call(&app, "POST", "/job-queue/v1/jobs", Some(json!({ "job_type": "osbuild" }))).await;
    let build_job = job_body["id"].as_str().unwrap().to_string();
    call(
        &app,
        "PATCH",
        &format!("/job-queue/v1/jobs/{build_job}"),
        Some(json!({ "status": "FINISHED", "result": { "build_output": { "success": true } } })),
    )
    .await;

    let (_, body) = call(&app, "GET", &format!("/composes/{compose}"), None).await;
    assert_eq!(body["queue_status"], "FINISHED");
    assert_eq!(body["uploads"][0]["provider"], "org.kiln.koji");
    assert_eq!(body["uploads"][0]["status"], "WAITING");

    // Registration runs as its own dependent jobs
    let (_, init_body) =
        call(&app, "POST", "/job-queue/v1/jobs", Some(json!({ "job_type": "koji-init" }))).await;
    let init_job = init_body["id"].as_str().unwrap().to_string();
    call(
        &app,
        "PATCH",
        &format!("/job-queue/v1/jobs/{init_job}"),
        Some(json!({ "status": "FINISHED", "result": { "build_id": 7, "token": "t" } })),
    )
    .await;

    let (status, finalize_body) = call(
        &app,
        "POST",
        "/job-queue/v1/jobs",
        Some(json!({ "job_type": "koji-finalize" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    // The envelope carries the upstream results for the worker
    assert_eq!(finalize_body["dependency_results"].as_array().unwrap().len(), 2);
    let finalize_job = finalize_body["id"].as_str().unwrap().to_string();
    call(
        &app,
        "PATCH",
        &format!("/job-queue/v1/jobs/{finalize_job}"),
        Some(json!({ "status": "FINISHED", "result": { "success": true } })),
    )
    .await;

    let (_, body) = call(&app, "GET", &format!("/composes/{compose}"), None).await;
    assert_eq!(body["uploads"][0]["status"], "FINISHED");
    assert_eq!(body["queue_status"], "FINISHED");
}

#[tokio::test]
async fn unknown_provider_is_rejected() {
    let dir = tempdir().unwrap();
    let app = router(test_state(dir.path()));

    let (status, body) = call(
        &app,
        "POST",
        "/composes",
        Some(json!({
            "blueprint_name": "base",
            "compose_type": "qcow2",
            "upload": [{ "provider": "rackspace", "image_name": "x", "settings": {} }],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("rackspace"));
}

#[tokio::test]
async fn status_of_unknown_compose_is_404() {
    let dir = tempdir().unwrap();
    let app = router(test_state(dir.path()));

    let (status, _) =
        call(&app, "GET", &format!("/composes/{}", uuid::Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Image download ───────────────────────────────────────────────────────────

async fn run_compose_to_completion(app: &Router) -> String {
    let (_, body) = call(
        app,
        "POST",
        "/composes",
        Some(json!({ "blueprint_name": "base", "compose_type": "qcow2" })),
    )
    .await;
    let compose = body["id"].as_str().unwrap().to_string();

    let (_, job_body) =
        call(app, "POST", "/job-queue/v1/jobs", Some(json!({ "job_type": "osbuild" }))).await;
    let job = job_body["id"].as_str().unwrap().to_string();

    // Worker uploads the image, then reports success
    let upload = HttpRequest::builder()
        .method("POST")
        .uri(format!("/job-queue/v1/jobs/{job}/artifacts/disk.qcow2"))
        .header("content-type", "application/octet-stream")
        .body(Body::from(&b"qcow2-bytes"[..]))
        .unwrap();
    assert_eq!(app.clone().oneshot(upload).await.unwrap().status(), StatusCode::OK);

    let (status, _) = call(
        app,
        "PATCH",
        &format!("/job-queue/v1/jobs/{job}"),
        Some(json!({
            "status": "FINISHED",
            "result": { "build_output": { "success": true, "size": 11 } },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    compose
}

#[tokio::test]
async fn image_download_streams_the_artifact() {
    let dir = tempdir().unwrap();
    let app = router(test_state(dir.path()));

    let compose = run_compose_to_completion(&app).await;

    let request = HttpRequest::builder()
        .method("GET")
        .uri(format!("/composes/{compose}/image"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/x-qemu-disk");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"qcow2-bytes");
}

#[tokio::test]
async fn image_download_requires_a_finished_compose() {
    let dir = tempdir().unwrap();
    let app = router(test_state(dir.path()));

    let (_, body) = call(
        &app,
        "POST",
        "/composes",
        Some(json!({ "blueprint_name": "base", "compose_type": "qcow2" })),
    )
    .await;
    let compose = body["id"].as_str().unwrap().to_string();

    let (status, _) = call(&app, "GET", &format!("/composes/{compose}/image"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Cancel & delete ──────────────────────────────────────────────────────────

#[tokio::test]
async fn cancel_fails_the_compose_like_a_failed_build() {
    let dir = tempdir().unwrap();
    let app = router(test_state(dir.path()));

    let (_, body) = call(
        &app,
        "POST",
        "/composes",
        Some(json!({ "blueprint_name": "base", "compose_type": "qcow2" })),
    )
    .await;
    let compose = body["id"].as_str().unwrap().to_string();

    let (status, _) = call(&app, "POST", &format!("/composes/{compose}/cancel"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, "GET", &format!("/composes/{compose}"), None).await;
    assert_eq!(body["queue_status"], "FAILED");
}

#[tokio::test]
async fn delete_removes_the_compose_its_jobs_and_artifacts() {
    let dir = tempdir().unwrap();
    let state = test_state(dir.path());
    let app = router(state.clone());

    let compose = run_compose_to_completion(&app).await;
    let job = state
        .store
        .get_compose(compose.parse().unwrap())
        .unwrap()
        .image_build
        .job_id
        .unwrap();

    let (status, _) = call(&app, "DELETE", &format!("/composes/{compose}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, "GET", &format!("/composes/{compose}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(matches!(state.queue.job_status(job), Err(kiln_queue::QueueError::NotExist)));
    assert!(!dir.path().join("artifacts").join(job.to_string()).exists());

    let (status, _) = call(&app, "DELETE", &format!("/composes/{compose}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
