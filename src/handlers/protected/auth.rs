use axum::{extract::State, Extension};
use serde::Serialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::Principal;
use crate::database::BrandTheme;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Serialize)]
pub struct SchoolRef {
    pub id: Uuid,
    pub slug: String,
    pub theme: BrandTheme,
}

#[derive(Debug, Serialize)]
pub struct WhoAmI {
    #[serde(flatten)]
    pub principal: Principal,
    pub school: Option<SchoolRef>,
}

/// GET /api/auth/whoami - The authenticated principal and the school it administers
pub async fn whoami(State(state): State<AppState>, Extension(principal): Extension<Principal>) -> ApiResult<WhoAmI> {
    let school = state
        .store
        .find_by_admin(principal.user_id)
        .await?
        .map(|s| SchoolRef {
            id: s.id,
            theme: s.theme(),
            slug: s.slug,
        });

    Ok(ApiResponse::success(WhoAmI { principal, school }))
}
