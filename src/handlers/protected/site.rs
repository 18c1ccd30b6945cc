use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::Principal;
use crate::database::School;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::SiteDraft;

fn publish_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SiteRequest {
    pub html: String,
    #[serde(default = "publish_by_default")]
    pub publish: bool,
    pub version: Option<i64>,
}

/// PUT /api/school/site - Save the website builder's HTML and publish it
///
/// `publish` defaults to true. `version`, when given, must match the stored
/// record or the save fails with 409.
pub async fn site_put(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<SiteRequest>, JsonRejection>,
) -> ApiResult<School> {
    let Json(request) = payload?;

    let draft = SiteDraft {
        html: request.html,
        publish: request.publish,
        expected_version: request.version,
    };
    let school = state.school_service().save_site(&principal, draft).await?;

    Ok(ApiResponse::success(school))
}
