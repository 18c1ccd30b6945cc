use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::models::school::{NewSchool, School, SiteUpdate, ThemeUpdate};

/// Errors from a SchoolStore backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Version mismatch: expected {expected}, found {actual}")]
    VersionMismatch { expected: i64, actual: i64 },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Persistence boundary for school (tenant) records.
///
/// Every write is a single atomic statement and bumps `version`. When
/// `expected_version` is given the write only applies if it still matches.
#[async_trait]
pub trait SchoolStore: Send + Sync {
    /// Fails with `Conflict` when the slug or admin is already taken.
    async fn insert(&self, school: NewSchool) -> Result<School, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<School>, StoreError>;

    async fn find_by_admin(&self, admin_id: Uuid) -> Result<Option<School>, StoreError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<School>, StoreError>;

    async fn update_theme(
        &self,
        id: Uuid,
        update: ThemeUpdate,
        expected_version: Option<i64>,
    ) -> Result<School, StoreError>;

    async fn update_site(
        &self,
        id: Uuid,
        update: SiteUpdate,
        expected_version: Option<i64>,
    ) -> Result<School, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}
