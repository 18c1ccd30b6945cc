// handlers/protected/theme.rs - Brand theme endpoints
//
// POST /api/update-and-check-contrast  theme from a remote logo (bare JSON body)
// PUT  /api/school/theme               manual accent override
// POST /api/school/theme/recompute     re-run against the stored logo
// POST /api/school/logo                upload a logo, store it and theme from it

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::Principal;
use crate::branding::Color;
use crate::database::School;
use crate::error::ApiError;
use crate::handlers::form::UploadForm;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{TenantTarget, ThemeOutcome, ThemeSource};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContrastRequest {
    pub image_url: Option<String>,
    pub school_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ContrastResponse {
    pub message: &'static str,
    pub color: Color,
    pub logo_url: Option<String>,
    pub palette: Vec<Color>,
    pub source: ThemeSource,
}

impl From<ThemeOutcome> for ContrastResponse {
    fn from(outcome: ThemeOutcome) -> Self {
        Self {
            message: "Theme updated successfully",
            color: outcome.color,
            logo_url: outcome.school.logo_url,
            palette: outcome.school.theme_palette,
            source: outcome.source,
        }
    }
}

/// Enveloped result of the theme endpoints under /api/school.
#[derive(Debug, Serialize)]
pub struct ThemeResponse {
    pub color: Color,
    pub source: ThemeSource,
    pub school: School,
}

impl From<ThemeOutcome> for ThemeResponse {
    fn from(outcome: ThemeOutcome) -> Self {
        Self {
            color: outcome.color,
            source: outcome.source,
            school: outcome.school,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ManualThemeRequest {
    pub color: String,
    pub version: Option<i64>,
}

/// POST /api/update-and-check-contrast
///
/// ```json
/// { "imageUrl": "https://.../logo.png", "schoolId": "optional uuid" }
/// ```
///
/// Responds `{ message, color, logo_url, palette, source }`. Logos that cannot
/// be fetched or yield no readable color still succeed with the default color.
pub async fn update_and_check_contrast(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<ContrastRequest>, JsonRejection>,
) -> Result<Json<ContrastResponse>, ApiError> {
    let Json(request) = payload?;

    let image_url = request
        .image_url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Image URL is required"))?;
    Url::parse(image_url).map_err(|_| ApiError::field_error("imageUrl", "must be an absolute URL"))?;

    let outcome = state
        .theme_service()
        .apply_from_url(&principal, request.school_id.into(), image_url)
        .await?;

    Ok(Json(outcome.into()))
}

/// PUT /api/school/theme - Admin picks any color; no contrast threshold applies
pub async fn theme_put(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<ManualThemeRequest>, JsonRejection>,
) -> ApiResult<ThemeResponse> {
    let Json(request) = payload?;
    let color: Color = request
        .color
        .parse()
        .map_err(|e: crate::branding::ParseColorError| ApiError::field_error("color", e.to_string()))?;

    let outcome = state
        .theme_service()
        .apply_manual(&principal, TenantTarget::Owned, color, request.version)
        .await?;

    Ok(ApiResponse::success(outcome.into()))
}

/// POST /api/school/theme/recompute
pub async fn theme_recompute(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<ThemeResponse> {
    let outcome = state
        .theme_service()
        .recompute(&principal, TenantTarget::Owned)
        .await?;

    Ok(ApiResponse::success(outcome.into()))
}

/// POST /api/school/logo - multipart `file`
pub async fn logo_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ThemeResponse> {
    let file = UploadForm::read(multipart?).await?.require_file()?.require_image()?;

    let themes = state.theme_service();
    let school = themes.authorize(&principal, TenantTarget::Owned).await?;

    let blob = state.blobs.put(&file.file_name, &file.bytes).await?;
    let outcome = themes.brand_from_image(&school, file.to_image(), blob.url).await?;

    Ok(ApiResponse::success(outcome.into()))
}
