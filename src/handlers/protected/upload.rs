use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiError;
use crate::handlers::form::UploadForm;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// POST /api/upload - Store an image and return its public URL as `{ "url": ... }`
pub async fn upload_post(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let file = UploadForm::read(multipart?).await?.require_file()?.require_image()?;
    let blob = state.blobs.put(&file.file_name, &file.bytes).await?;
    Ok(Json(UploadResponse { url: blob.url }))
}
