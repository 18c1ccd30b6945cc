use axum::{
    extract::{Path, State},
    response::Html,
};

use crate::app::AppState;
use crate::error::ApiError;

/// GET /sites/:slug - Published school site HTML
pub async fn site_get(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Html<String>, ApiError> {
    let html = state.school_service().published_site(&slug).await?;
    Ok(Html(html))
}
