//! # API REST
//!
//! HTTP surface for the chunkd upload engine.
//!
//! Handles:
//! - `POST /upload` — one multipart chunk per request (fields `name`,
//!   optional `chunk`/`chunks`, one file part)
//! - `GET|POST /resume` — where should the client resume a file name
//! - `GET /health` — liveness
//! - OpenAPI/Swagger documentation
//!
//! Upload failures follow the protocol's boolean contract: the client gets
//! `{"status": false}` and decides to retry or query `/resume`; root causes
//! go to the server logs.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use chunkd_core::{ChunkAssembler, FileName, UploadError};

/// Shared state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub assembler: Arc<ChunkAssembler>,
}

/// Response body for `/upload`.
///
/// `newName` is the logical name the artifact resolves to; omitted on
/// failure.
#[derive(Debug, serde::Serialize, serde::Deserialize, ToSchema)]
pub struct UploadRes {
    pub status: bool,
    #[serde(rename = "newName", skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
}

/// Response body for `/resume`: the chunk index to (re)send next.
#[derive(Debug, serde::Serialize, serde::Deserialize, ToSchema)]
pub struct ResumeRes {
    pub off: u32,
}

/// Response body for `/health`.
#[derive(Debug, serde::Serialize, serde::Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, serde::Deserialize, IntoParams)]
pub struct ResumeParams {
    /// Logical file name of the upload to resume.
    pub filename: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, upload, resume),
    components(schemas(UploadRes, ResumeRes, HealthRes))
)]
struct ApiDoc;

/// Builds the full application router.
///
/// The request body limit is derived from the configured per-chunk ceiling
/// plus headroom for multipart framing and the form fields.
pub fn app(state: AppState) -> Router {
    let body_limit = state.assembler.config().max_chunk_bytes() as usize + 64 * 1024;

    Router::new()
        .route("/health", get(health))
        .route("/upload", axum::routing::post(upload))
        .route("/resume", get(resume).post(resume))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Liveness endpoint for monitoring and load balancer checks.
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "chunkd is alive".into(),
    })
}

/// One multipart chunk parsed out of an `/upload` request.
#[derive(Debug, Default)]
struct ChunkForm {
    name: Option<String>,
    chunk: Option<u32>,
    chunks: Option<u32>,
    payload: Option<axum::body::Bytes>,
}

/// Field order in the multipart body is client-controlled (uploaders
/// commonly send the file part before the metadata fields), so the whole
/// request is read before anything is decided.
async fn read_chunk_form(mut multipart: Multipart) -> Result<ChunkForm, String> {
    let mut form = ChunkForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("invalid multipart body: {e}"))?
    {
        let field_name = field.name().unwrap_or_default().to_owned();
        match field_name.as_str() {
            "name" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| format!("invalid 'name' field: {e}"))?;
                form.name = Some(value);
            }
            "chunk" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| format!("invalid 'chunk' field: {e}"))?;
                form.chunk =
                    Some(value.trim().parse().map_err(|_| {
                        format!("'chunk' must be a positive integer, got {value:?}")
                    })?);
            }
            "chunks" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| format!("invalid 'chunks' field: {e}"))?;
                form.chunks =
                    Some(value.trim().parse().map_err(|_| {
                        format!("'chunks' must be a positive integer, got {value:?}")
                    })?);
            }
            _ if field.file_name().is_some() || field_name == "file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| format!("failed to read chunk payload: {e}"))?;
                form.payload = Some(bytes);
            }
            // Unknown form fields are ignored, matching common uploader
            // widgets that send extras.
            _ => {}
        }
    }
    Ok(form)
}

#[utoipa::path(
    post,
    path = "/upload",
    responses(
        (status = 200, description = "Chunk accepted, or upload failed (status=false)", body = UploadRes),
        (status = 400, description = "Malformed upload request", body = UploadRes)
    )
)]
/// Accepts one chunk of a (possibly resumable) upload.
///
/// Multipart form fields: `name` (required), `chunk` (optional 1-based
/// index; absent means a single-shot upload), `chunks` (total count,
/// required when `chunk` is present), plus one file part with the chunk
/// bytes. Receiving the final chunk triggers the merge into the final
/// artifact.
async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> (StatusCode, Json<UploadRes>) {
    let failed = |status: StatusCode| {
        (
            status,
            Json(UploadRes {
                status: false,
                new_name: None,
            }),
        )
    };

    let form = match read_chunk_form(multipart).await {
        Ok(form) => form,
        Err(reason) => {
            tracing::warn!(%reason, "rejecting malformed upload request");
            return failed(StatusCode::BAD_REQUEST);
        }
    };

    let Some(raw_name) = form.name else {
        tracing::warn!("rejecting upload request without 'name' field");
        return failed(StatusCode::BAD_REQUEST);
    };
    let file_name = match FileName::new(&raw_name) {
        Ok(name) => name,
        Err(e) => {
            tracing::warn!(name = %raw_name, error = %e, "rejecting invalid file name");
            return failed(StatusCode::BAD_REQUEST);
        }
    };
    let Some(payload) = form.payload else {
        tracing::warn!(file_name = %file_name, "rejecting upload request without file part");
        return failed(StatusCode::BAD_REQUEST);
    };

    match state
        .assembler
        .receive_chunk(&file_name, form.chunk, form.chunks, &payload)
    {
        Ok(()) => (
            StatusCode::OK,
            Json(UploadRes {
                status: true,
                new_name: Some(file_name.to_string()),
            }),
        ),
        Err(e @ UploadError::MalformedRequest(_)) | Err(e @ UploadError::InvalidFileName(_)) => {
            tracing::warn!(file_name = %file_name, error = %e, "malformed chunk upload");
            failed(StatusCode::BAD_REQUEST)
        }
        Err(e) => {
            // Per protocol the client only learns a boolean; it is expected
            // to retry the chunk or consult /resume.
            tracing::error!(file_name = %file_name, error = %e, "chunk upload failed");
            failed(StatusCode::OK)
        }
    }
}

#[utoipa::path(
    get,
    path = "/resume",
    params(ResumeParams),
    responses(
        (status = 200, description = "Chunk index the client should send next", body = ResumeRes),
        (status = 400, description = "Invalid file name"),
        (status = 500, description = "Internal server error")
    )
)]
/// Reports where an interrupted upload should resume.
///
/// Returns the chunk index the client should (re)send for `filename`, `1`
/// when no upload is in progress. The possibly-partial chunk file for the
/// returned index is discarded server-side before answering.
async fn resume(
    State(state): State<AppState>,
    Query(params): Query<ResumeParams>,
) -> Result<Json<ResumeRes>, (StatusCode, &'static str)> {
    let file_name = match FileName::new(&params.filename) {
        Ok(name) => name,
        Err(e) => {
            tracing::warn!(filename = %params.filename, error = %e, "invalid resume query");
            return Err((StatusCode::BAD_REQUEST, "Invalid file name"));
        }
    };

    match state.assembler.resume_offset(&file_name) {
        Ok(off) => Ok(Json(ResumeRes { off })),
        Err(e) => {
            tracing::error!(file_name = %file_name, error = %e, "resume query failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal error"))
        }
    }
}
