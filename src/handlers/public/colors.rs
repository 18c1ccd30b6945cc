// handlers/public/colors.rs - Palette extraction
//
// GET  /api/get-colors?imageUrl=...&count=N  (remote image)
// POST /api/get-colors                       (multipart `file`, optional `count`)
//
// Both answer `{ "palette": ["#rrggbb", ...] }` without the success envelope.

use axum::{
    extract::{rejection::QueryRejection, multipart::MultipartRejection, Multipart, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::AppState;
use crate::branding::Palette;
use crate::error::ApiError;
use crate::handlers::form::UploadForm;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorsQuery {
    pub image_url: Option<String>,
    pub count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PaletteResponse {
    pub palette: Palette,
}

pub async fn colors_get(
    State(state): State<AppState>,
    query: Result<Query<ColorsQuery>, QueryRejection>,
) -> Result<Json<PaletteResponse>, ApiError> {
    let Query(query) = query?;

    let raw = query
        .image_url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Image URL is required"))?;
    let url = Url::parse(raw).map_err(|_| ApiError::field_error("imageUrl", "must be an absolute URL"))?;

    let image = state.images.fetch(&url).await?;
    let count = query.count.unwrap_or(state.config.theme.palette_size);
    let palette = state
        .extractor
        .extract_blocking(image.bytes, image.media_type, count)
        .await?;

    Ok(Json(PaletteResponse { palette }))
}

pub async fn colors_post(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PaletteResponse>, ApiError> {
    let form = UploadForm::read(multipart?).await?;
    let count = form.count.unwrap_or(state.config.theme.palette_size);
    let image = form.require_file()?.to_image()?;

    let palette = state
        .extractor
        .extract_blocking(image.bytes, image.media_type, count)
        .await?;

    Ok(Json(PaletteResponse { palette }))
}
