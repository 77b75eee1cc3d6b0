use axum::http::StatusCode;
use clonekit_core::config::Config;
use clonekit_core::intake::{stage_bytes, IntakeRequest, StagedRun};
use clonekit_core::run::PipelineState;
use http_body_util::BodyExt;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const BOUNDARY: &str = "clonekit-test-boundary";

/// Config whose pipeline is a shell one-liner. `sh -c` receives the platform
/// and binary path as `$0` and `$1`.
fn config_with(script: &str) -> Config {
    let mut config = Config::default();
    config.pipeline.command = vec!["sh".into(), "-c".into(), script.into()];
    config
}

fn router(dir: &TempDir, script: &str) -> axum::Router {
    clonekit_server::build_router(dir.path().to_path_buf(), config_with(script))
}

fn layout(dir: &TempDir) -> clonekit_core::paths::StorageLayout {
    Config::default().layout(dir.path())
}

fn stage(dir: &TempDir, filename: &str) -> StagedRun {
    let req = IntakeRequest {
        filename: filename.to_string(),
        app_name: "Shop".to_string(),
        version: "1.0".to_string(),
        notes: String::new(),
    };
    stage_bytes(&layout(dir), &req, b"binary").unwrap()
}

/// Send a GET request via `oneshot` and return (status, parsed JSON body).
async fn get(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Send a GET request and return (status, body as text).
async fn get_text(app: &axum::Router, uri: &str) -> (StatusCode, String) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&body).into_owned())
}

/// Send an empty POST request and return (status, parsed JSON body).
async fn post(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// POST a multipart upload built from text fields and an optional file.
async fn post_upload(
    app: &axum::Router,
    fields: &[(&str, &str)],
    file: Option<(&str, &[u8])>,
) -> (StatusCode, serde_json::Value) {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/api/runs")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(axum::body::Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Poll a run until it reaches a terminal status.
async fn wait_terminal(app: &axum::Router, folder: &str) -> serde_json::Value {
    for _ in 0..200 {
        let (status, run) = get(app, &format!("/api/runs/{folder}")).await;
        assert_eq!(status, StatusCode::OK);
        if matches!(run["status"].as_str(), Some("succeeded" | "failed" | "skipped")) {
            return run;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("run {folder} never reached a terminal status");
}

// ---------------------------------------------------------------------------
// Health & listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_ok() {
    let dir = TempDir::new().unwrap();
    let (status, json) = get(&router(&dir, "true"), "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn list_is_empty_without_uploads() {
    let dir = TempDir::new().unwrap();
    let (status, json) = get(&router(&dir, "true"), "/api/runs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!([]));
}

#[tokio::test]
async fn list_respects_limit_and_reports_pending() {
    let dir = TempDir::new().unwrap();
    for _ in 0..3 {
        stage(&dir, "app.apk");
    }
    let app = router(&dir, "true");

    let (_, all) = get(&app, "/api/runs").await;
    assert_eq!(all.as_array().unwrap().len(), 3);
    for run in all.as_array().unwrap() {
        assert_eq!(run["status"], "pending");
        assert_eq!(run["platform"], "android");
        assert_eq!(run["canRetry"], true);
    }

    let (_, limited) = get(&app, "/api/runs?limit=2").await;
    assert_eq!(limited.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn invalid_and_unknown_folders() {
    let dir = TempDir::new().unwrap();
    let app = router(&dir, "true");

    let (status, json) = get(&app, "/api/runs/-bad").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let (status, _) = get(&app, "/api/runs/20240101T000000-deadbeef").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Intake
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_launches_pipeline_to_success() {
    let dir = TempDir::new().unwrap();
    let app = router(&dir, "echo capturing $0; exit 0");

    let (status, json) = post_upload(
        &app,
        &[("appName", "Shop"), ("version", "2.0"), ("notes", "first")],
        Some(("shop.apk", b"PK-data")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["started"], true);
    assert_eq!(json["run"]["appName"], "Shop");
    assert_eq!(json["run"]["platform"], "android");

    let folder = json["run"]["folder"].as_str().unwrap().to_string();
    let run = wait_terminal(&app, &folder).await;
    assert_eq!(run["status"], "succeeded");
    assert_eq!(run["exitCode"], 0);
    assert!(run["completedAt"].is_string());

    let (status, log) = get_text(&app, &format!("/api/runs/{folder}/log")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(log.contains("capturing android"));
    assert!(log.ends_with("Pipeline exited with code 0\n"));

    // Incoming area is left empty once the upload is staged.
    let incoming = layout(&dir).incoming;
    assert_eq!(std::fs::read_dir(incoming).unwrap().count(), 0);
}

#[tokio::test]
async fn upload_with_failing_pipeline_records_exit_code() {
    let dir = TempDir::new().unwrap();
    let app = router(&dir, "echo nope >&2; exit 3");

    let (status, json) =
        post_upload(&app, &[("appName", "Shop")], Some(("shop.ipa", b"ipa"))).await;
    assert_eq!(status, StatusCode::CREATED);
    let folder = json["run"]["folder"].as_str().unwrap().to_string();

    let run = wait_terminal(&app, &folder).await;
    assert_eq!(run["status"], "failed");
    assert_eq!(run["exitCode"], 3);
    assert_eq!(run["platform"], "ios");
}

#[tokio::test]
async fn unsupported_upload_is_skipped() {
    let dir = TempDir::new().unwrap();
    let app = router(&dir, "true");

    let (status, json) =
        post_upload(&app, &[("appName", "Shop")], Some(("shop.zip", b"zip"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["started"], false);
    assert_eq!(json["run"]["status"], "skipped");
    assert_eq!(json["run"]["note"], "Unsupported file type: shop.zip");
    assert_eq!(json["run"]["canRetry"], false);
}

#[tokio::test]
async fn upload_without_app_name_is_rejected() {
    let dir = TempDir::new().unwrap();
    let app = router(&dir, "true");

    let (status, json) = post_upload(&app, &[("version", "1")], Some(("a.apk", b"x"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("appName"));
    assert!(!layout(&dir).uploads.exists());
    assert_eq!(std::fs::read_dir(layout(&dir).incoming).unwrap().count(), 0);
}

#[tokio::test]
async fn upload_without_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (status, json) = post_upload(&router(&dir, "true"), &[("appName", "Shop")], None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("file"));
}

// ---------------------------------------------------------------------------
// Row actions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unlaunched_run_has_no_log_action() {
    let dir = TempDir::new().unwrap();
    let staged = stage(&dir, "app.apk");
    let app = router(&dir, "true");

    let (status, run) = get(&app, &format!("/api/runs/{}", staged.folder)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["canViewLog"], false);
    assert!(run["logFile"].is_null());

    let (status, _) = get(&app, &format!("/api/runs/{}/log", staged.folder)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn retry_of_running_run_conflicts() {
    let dir = TempDir::new().unwrap();
    let staged = stage(&dir, "app.apk");
    let plan = staged.plan.unwrap();
    PipelineState::running(&plan.id, plan.platform, &plan.log_file)
        .save(&plan.state_path)
        .unwrap();

    let (status, json) = post(
        &router(&dir, "true"),
        &format!("/api/runs/{}/retry", staged.folder),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn retry_of_unknown_platform_is_unprocessable() {
    let dir = TempDir::new().unwrap();
    let staged = stage(&dir, "app.zip");
    let (status, _) = post(
        &router(&dir, "true"),
        &format!("/api/runs/{}/retry", staged.folder),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn retry_without_binary_is_not_found() {
    let dir = TempDir::new().unwrap();
    let staged = stage(&dir, "app.apk");
    std::fs::remove_file(staged.plan.unwrap().binary_path).unwrap();
    let (status, _) = post(
        &router(&dir, "true"),
        &format!("/api/runs/{}/retry", staged.folder),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn retry_relaunches_with_fresh_log() {
    let dir = TempDir::new().unwrap();
    let staged = stage(&dir, "app.apk");
    let app = router(&dir, "echo retry-run");

    let (status, json) = post(&app, &format!("/api/runs/{}/retry", staged.folder)).await;
    assert_eq!(status, StatusCode::ACCEPTED, "{json}");
    assert_eq!(json["started"], true);
    let first_log = json["logFile"].as_str().unwrap().to_string();

    let run = wait_terminal(&app, &staged.folder).await;
    assert_eq!(run["status"], "succeeded");
    assert_eq!(run["logFile"], first_log.as_str());

    // Let the finished launch release its in-flight slot.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let (status, json) = post(&app, &format!("/api/runs/{}/retry", staged.folder)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_ne!(json["logFile"].as_str().unwrap(), first_log);
    wait_terminal(&app, &staged.folder).await;
}

#[tokio::test]
async fn second_retry_while_in_flight_conflicts() {
    let dir = TempDir::new().unwrap();
    let staged = stage(&dir, "app.apk");
    let app = router(&dir, "sleep 1");

    let (status, _) = post(&app, &format!("/api/runs/{}/retry", staged.folder)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _) = post(&app, &format!("/api/runs/{}/retry", staged.folder)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    wait_terminal(&app, &staged.folder).await;
}

#[tokio::test]
async fn events_stream_only_for_active_launch() {
    let dir = TempDir::new().unwrap();
    let staged = stage(&dir, "app.apk");
    let app = router(&dir, "sleep 1");
    let uri = format!("/api/runs/{}/events", staged.folder);

    let (status, _) = get(&app, &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post(&app, &format!("/api/runs/{}/retry", staged.folder)).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let req = axum::http::Request::builder()
        .uri(&uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ct = response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(ct.starts_with("text/event-stream"), "got {ct}");
    drop(response);

    wait_terminal(&app, &staged.folder).await;
}
