use axum::{Json, extract::State};

use crate::{
    AppState,
    error::{ApiError, ValidMultipart},
    models::{CleanupResponse, UploadResponse},
};

/// Name of the multipart field carrying the file.
const FILE_FIELD: &str = "file";

/// upload_file
///
/// [Public Route] Stores the `file` field of a multipart form and returns the
/// public path it is served under. Other fields are skipped.
#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content_type = "multipart/form-data", description = "Form with a `file` field"),
    responses(
        (status = 200, description = "Stored", body = UploadResponse),
        (status = 400, description = "No file field", body = crate::error::ErrorBody),
        (status = 500, description = "Write failed", body = crate::error::ErrorBody)
    )
)]
pub async fn upload_file(
    State(state): State<AppState>,
    ValidMultipart(mut multipart): ValidMultipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let original = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;

        let url = state.uploads.store(&bytes, &original).await?;
        return Ok(Json(UploadResponse { url }));
    }

    Err(ApiError::validation("multipart field `file` is required"))
}

/// cleanup_uploads
///
/// [Public Route] Runs one orphan reconciliation pass immediately.
#[utoipa::path(
    get,
    path = "/api/cleanup",
    responses(
        (status = 200, description = "Reconciled", body = CleanupResponse),
        (status = 500, description = "Scan failed", body = crate::error::ErrorBody)
    )
)]
pub async fn cleanup_uploads(
    State(state): State<AppState>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let removed = state.uploads.reconcile(&state.repo).await?;
    tracing::info!(removed, "manual upload cleanup finished");
    Ok(Json(CleanupResponse { removed }))
}
