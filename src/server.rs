//! HTTP upload service.
//!
//! | Method | Path      | Response                                            |
//! |--------|-----------|-----------------------------------------------------|
//! | GET    | `/`       | HTML upload form                                    |
//! | POST   | `/upload` | `converted.xlsx` attachment, or `{"error": "..."}`  |
//!
//! `/upload` expects a multipart body with a file part named `file`. Client
//! errors (see [`ConvertError::is_client_error`]) answer `400`; every other
//! failure answers `500` with the error's message text unchanged.

use crate::config::{ConversionConfig, ServerConfig};
use crate::convert;
use crate::error::ConvertError;
use crate::pipeline::{input, xlsx, Backends};
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Download name of every generated workbook.
pub const DOWNLOAD_NAME: &str = "converted.xlsx";

const INDEX_HTML: &str = include_str!("assets/index.html");

/// Shared state handed to every request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub server: Arc<ServerConfig>,
    pub config: Arc<ConversionConfig>,
    pub backends: Backends,
}

impl AppState {
    pub fn new(server: ServerConfig, config: ConversionConfig, backends: Backends) -> Self {
        Self {
            server: Arc::new(server),
            config: Arc::new(config),
            backends,
        }
    }
}

/// Build the service's router.
pub fn router(state: AppState) -> Router {
    let limit = state.server.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

/// Bind, serve until Ctrl-C, then drain in-flight requests.
///
/// The upload directory is created before the listener is bound.
pub async fn serve(
    server: ServerConfig,
    config: ConversionConfig,
    backends: Backends,
) -> Result<(), ConvertError> {
    tokio::fs::create_dir_all(&server.upload_dir).await?;
    let addr = server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(
        "Listening on http://{} (uploads staged in {})",
        listener.local_addr()?,
        server.upload_dir.display()
    );

    let app = router(AppState::new(server, config, backends));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested, draining connections");
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ConvertError> {
    let mut multipart = multipart.map_err(|e| {
        warn!("Upload without multipart body: {}", e);
        ConvertError::NoFilePart
    })?;

    let (filename, bytes) = read_file_part(&mut multipart).await?;
    let upload = input::store_upload(&state.server.upload_dir, &filename, bytes).await?;
    info!(
        "Converting upload '{}' ({})",
        upload.original_name(),
        upload.path().display()
    );

    let conversion = convert::convert(upload.path(), &state.config, &state.backends).await?;
    let workbook = conversion.to_xlsx()?;
    info!(
        "Upload '{}' converted via {} ({} rows, {} bytes)",
        upload.original_name(),
        conversion.source,
        conversion.sheet.rows.len(),
        workbook.len()
    );

    Ok((
        [
            (header::CONTENT_TYPE, xlsx::XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", DOWNLOAD_NAME),
            ),
        ],
        workbook,
    )
        .into_response())
}

/// Find the part named `file` that carries a filename.
///
/// A plain form field called `file` does not count as a file part.
async fn read_file_part(multipart: &mut Multipart) -> Result<(String, Bytes), ConvertError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ConvertError::MalformedUpload(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let Some(raw_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let filename = input::validate_filename(Some(&raw_name))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ConvertError::MalformedUpload(e.body_text()))?;
        return Ok((filename, bytes));
    }
    Err(ConvertError::NoFilePart)
}

impl IntoResponse for ConvertError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            warn!("Rejected upload: {}", self);
            StatusCode::BAD_REQUEST
        } else {
            error!("Conversion failed: {}", self);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ConvertError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn client_errors_are_400() {
        assert_eq!(status_of(ConvertError::NoFilePart), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(ConvertError::InvalidUpload {
                filename: "notes.txt".into()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ConvertError::NoTabularData), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn pipeline_errors_are_500() {
        assert_eq!(
            status_of(ConvertError::OcrFailed {
                page: 1,
                detail: "boom".into()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ConvertError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn index_has_upload_form() {
        assert!(INDEX_HTML.contains(r#"action="/upload""#));
        assert!(INDEX_HTML.contains(r#"name="file""#));
    }
}
