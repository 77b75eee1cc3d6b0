use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use clonekit_core::error::ClonekitError;
use clonekit_core::intake::IntakeRequest;
use clonekit_core::registry;
use serde::Deserialize;
use std::convert::Infallible;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

fn join_error(e: tokio::task::JoinError) -> AppError {
    AppError(anyhow::anyhow!("task join error: {e}"))
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

/// GET /api/runs — most recent runs, newest first.
pub async fn list_runs(
    State(app): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let layout = app.layout.clone();
    let limit = params.limit.unwrap_or(app.config.registry.limit);
    let runs = tokio::task::spawn_blocking(move || registry::list_runs(&layout, limit))
        .await
        .map_err(join_error)??;
    Ok(Json(serde_json::json!(runs)))
}

/// GET /api/runs/:folder — single run view.
pub async fn get_run(
    State(app): State<AppState>,
    Path(folder): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let layout = app.layout.clone();
    let view = tokio::task::spawn_blocking(move || registry::find_run(&layout, &folder))
        .await
        .map_err(join_error)??;
    Ok(Json(serde_json::json!(view)))
}

// ---------------------------------------------------------------------------
// Row actions
// ---------------------------------------------------------------------------

/// GET /api/runs/:folder/log — current log contents as plain text.
pub async fn get_log(
    State(app): State<AppState>,
    Path(folder): Path<String>,
) -> Result<Response, AppError> {
    let layout = app.layout.clone();
    let text = tokio::task::spawn_blocking(move || registry::read_log(&layout, &folder))
        .await
        .map_err(join_error)??;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        text,
    )
        .into_response())
}

/// POST /api/runs/:folder/retry — relaunch the pipeline for an existing run.
pub async fn retry_run(
    State(app): State<AppState>,
    Path(folder): Path<String>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let layout = app.layout.clone();
    let target = folder.clone();
    let plan = tokio::task::spawn_blocking(move || registry::prepare_retry(&layout, &target))
        .await
        .map_err(join_error)??;

    let handle = app.start_launch(&plan).await?;
    info!(folder = %folder, log_file = %handle.log_file, "retry launched");
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "folder": folder,
            "logFile": handle.log_file,
            "started": true,
        })),
    ))
}

/// GET /api/runs/:folder/events — live SSE stream for an in-flight launch.
pub async fn run_events(
    State(app): State<AppState>,
    Path(folder): Path<String>,
) -> Result<Response, AppError> {
    clonekit_core::paths::validate_folder(&folder)?;
    let handle = app
        .active_launch(&folder)
        .await
        .ok_or_else(|| AppError::not_found(format!("no active launch for '{folder}'")))?;

    let rx = handle.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| {
        msg.ok()
            .and_then(|event| serde_json::to_string(&event).ok())
            .map(|data| Ok::<Event, Infallible>(Event::default().event("pipeline").data(data)))
    });
    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response())
}

// ---------------------------------------------------------------------------
// Intake
// ---------------------------------------------------------------------------

/// POST /api/runs — multipart upload (`file`, `appName`, `version`, `notes`).
///
/// The file is streamed into the incoming area, staged into a new run
/// folder, and launched when its platform is recognized. Unsupported file
/// types are staged as `skipped`.
pub async fn create_run(
    State(app): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let part = app.layout.incoming_file();
    let (req, received) = match receive_upload(&app, multipart, &part).await {
        Ok(r) => r,
        Err(e) => {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e);
        }
    };
    let received = received.ok_or_else(|| ClonekitError::MissingField("file".to_string()))?;

    let layout = app.layout.clone();
    let staged = tokio::task::spawn_blocking(move || {
        clonekit_core::intake::stage_upload(&layout, &req, &received)
    })
    .await
    .map_err(join_error)??;

    let started = match &staged.plan {
        Some(plan) => {
            app.start_launch(plan).await?;
            true
        }
        None => false,
    };

    let layout = app.layout.clone();
    let folder = staged.folder.clone();
    let view = tokio::task::spawn_blocking(move || registry::find_run(&layout, &folder))
        .await
        .map_err(join_error)??;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "run": view,
            "started": started,
        })),
    ))
}

/// Read the multipart body, streaming the `file` field to `part`.
async fn receive_upload(
    app: &AppState,
    mut multipart: Multipart,
    part: &std::path::Path,
) -> Result<(IntakeRequest, Option<PathBuf>), AppError> {
    let mut req = IntakeRequest::default();
    let mut received = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if received.is_some() {
                    return Err(AppError::bad_request("only one file may be uploaded"));
                }
                req.filename = field.file_name().unwrap_or_default().to_string();
                clonekit_core::io::ensure_dir(&app.layout.incoming)?;
                let mut out = tokio::fs::File::create(part).await?;
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| AppError::bad_request(e.to_string()))?
                {
                    out.write_all(&chunk).await?;
                }
                out.flush().await?;
                received = Some(part.to_path_buf());
            }
            "appName" | "version" | "notes" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(e.to_string()))?;
                match name.as_str() {
                    "appName" => req.app_name = text,
                    "version" => req.version = text,
                    _ => req.notes = text,
                }
            }
            _ => {}
        }
    }

    Ok((req, received))
}
