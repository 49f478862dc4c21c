//! HTTP surface.
//!
//! `POST /api/` takes a multipart form whose `questions` part is the
//! question text; every other part with a filename is an attachment. The
//! response is always 200 with the answer JSON. A body that cannot be read
//! in full (including one over the upload limit) gets a `LoadError` answer.

use crate::config::ServerConfig;
use crate::handler::RequestHandler;
use crate::models::{Answer, FileSet, Question};
use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

type HandlerArc = Arc<RequestHandler>;

/// Form part carrying the question text.
pub const QUESTIONS_FIELD: &str = "questions";

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Build the router. Request bodies up to `max_upload_bytes` are accepted.
pub fn router(handler: HandlerArc, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/", post(analyze))
        .route("/health", get(health_check))
        .with_state(handler)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until it fails.
pub async fn run(handler: RequestHandler, config: &ServerConfig) -> Result<()> {
    let app = router(Arc::new(handler), config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!(
        "Listening on http://{} (uploads up to {} bytes)",
        config.bind, config.max_upload_bytes
    );

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Read the whole form. Any part that cannot be read fails the request
/// instead of being skipped.
async fn read_form(mut multipart: Multipart) -> Result<(Question, FileSet), String> {
    let mut question = Question::new("");
    let mut files = FileSet::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Malformed multipart body: {}", e))?
    {
        let name = field.name().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| {
            format!(
                "Failed to read form part {}: {}",
                file_name.as_deref().or(name.as_deref()).unwrap_or("<unnamed>"),
                e
            )
        })?;

        if name.as_deref() == Some(QUESTIONS_FIELD) {
            question = Question::from_bytes(&bytes);
        } else if let Some(file_name) = file_name {
            debug!("Attachment {} ({} bytes)", file_name, bytes.len());
            files.insert(file_name, bytes.to_vec());
        }
    }

    Ok((question, files))
}

async fn analyze(State(handler): State<HandlerArc>, multipart: Multipart) -> Json<Answer> {
    let start = Instant::now();
    let (question, files) = match read_form(multipart).await {
        Ok(form) => form,
        Err(message) => {
            warn!("{}", message);
            return Json(Answer::error("LoadError", &message));
        }
    };

    let answer = tokio::task::spawn_blocking(move || handler.handle(&question, &files, start))
        .await
        .unwrap_or_else(|e| {
            error!("Handler task failed: {}", e);
            Answer::error("InternalError", &e.to_string())
        });

    Json(answer)
}
