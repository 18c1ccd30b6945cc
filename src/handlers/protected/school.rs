use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::Principal;
use crate::database::School;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::SchoolSignup;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSchoolRequest {
    pub name: String,
    pub slug: Option<String>,
    pub logo_url: Option<String>,
}

/// POST /api/schools - Create the caller's school
///
/// ```json
/// { "name": "Hill Valley High", "slug": "hill-valley", "logoUrl": "https://..." }
/// ```
///
/// `slug` is derived from `name` when omitted. A `logoUrl` is branded immediately.
pub async fn school_create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<CreateSchoolRequest>, JsonRejection>,
) -> ApiResult<School> {
    let Json(request) = payload?;

    let signup = SchoolSignup {
        name: request.name,
        slug: request.slug,
        logo_url: request.logo_url,
    };
    let school = state.school_service().create_school(&principal, signup).await?;

    Ok(ApiResponse::created(school))
}

/// GET /api/school - The caller's school, for the dashboard and settings page
pub async fn school_get(State(state): State<AppState>, Extension(principal): Extension<Principal>) -> ApiResult<School> {
    let school = state.school_service().my_school(&principal).await?;
    Ok(ApiResponse::success(school))
}
