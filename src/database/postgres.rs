use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::branding::Color;
use crate::config::DatabaseConfig;

use super::models::school::{NewSchool, School, SchoolRow, SiteUpdate, ThemeUpdate};
use super::store::{SchoolStore, StoreError};

const SCHOOL_COLUMNS: &str = r#"
    id, admin_id, name, slug, logo_url, theme_color, theme_palette,
    is_published, html_content, version, created_at, updated_at
"#;

const SCHOOLS_DDL: &str = include_str!("../../sql/schools.sql");

/// SchoolStore over the hosted PostgreSQL `schools` table.
#[derive(Clone)]
pub struct PgSchoolStore {
    pool: PgPool,
}

impl PgSchoolStore {
    /// Opens a pool sized by `config` and creates the `schools` table if it is missing.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let url = config.url.as_deref().ok_or(StoreError::ConfigMissing("DATABASE_URL"))?;
        let parsed = url::Url::parse(url).map_err(|_| StoreError::InvalidDatabaseUrl)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!(
            "Connected to database {}{}",
            parsed.host_str().unwrap_or("localhost"),
            parsed.path()
        );

        sqlx::query(SCHOOLS_DDL).execute(&pool).await?;
        Ok(Self { pool })
    }

    fn select_where(clause: &str) -> String {
        format!("SELECT {} FROM schools WHERE {}", SCHOOL_COLUMNS, clause)
    }

    /// Distinguishes "no such row" from "stale version" after an update matched nothing.
    async fn missed_update(&self, id: Uuid, expected_version: Option<i64>) -> StoreError {
        let current: Result<Option<(i64,)>, sqlx::Error> = sqlx::query_as("SELECT version FROM schools WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await;

        match (current, expected_version) {
            (Ok(Some((actual,))), Some(expected)) => StoreError::VersionMismatch { expected, actual },
            (Ok(_), _) => StoreError::NotFound(format!("school {}", id)),
            (Err(e), _) => StoreError::Sqlx(e),
        }
    }
}

fn map_unique_violation(err: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let detail = match db.constraint() {
                Some(c) if c.contains("slug") => "slug is already taken".to_string(),
                Some(c) if c.contains("admin") => "user already administers a school".to_string(),
                _ => format!("{} already exists", what),
            };
            return StoreError::Conflict(detail);
        }
    }
    StoreError::Sqlx(err)
}

fn hex_list(colors: &[Color]) -> Vec<String> {
    colors.iter().map(Color::to_hex).collect()
}

#[async_trait]
impl SchoolStore for PgSchoolStore {
    async fn insert(&self, school: NewSchool) -> Result<School, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO schools (id, admin_id, name, slug, logo_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            SCHOOL_COLUMNS
        );

        let row = sqlx::query_as::<_, SchoolRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(school.admin_id)
            .bind(&school.name)
            .bind(&school.slug)
            .bind(&school.logo_url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "school"))?;

        info!("Created school '{}' ({}) for admin {}", row.slug, row.id, row.admin_id);
        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<School>, StoreError> {
        let row = sqlx::query_as::<_, SchoolRow>(&Self::select_where("id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(School::from))
    }

    async fn find_by_admin(&self, admin_id: Uuid) -> Result<Option<School>, StoreError> {
        let row = sqlx::query_as::<_, SchoolRow>(&Self::select_where("admin_id = $1"))
            .bind(admin_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(School::from))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<School>, StoreError> {
        let row = sqlx::query_as::<_, SchoolRow>(&Self::select_where("slug = $1"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(School::from))
    }

    async fn update_theme(
        &self,
        id: Uuid,
        update: ThemeUpdate,
        expected_version: Option<i64>,
    ) -> Result<School, StoreError> {
        let sql = format!(
            r#"
            UPDATE schools SET
                theme_color = $2,
                logo_url = COALESCE($3, logo_url),
                theme_palette = COALESCE($4, theme_palette),
                version = version + 1,
                updated_at = now()
            WHERE id = $1 AND ($5::bigint IS NULL OR version = $5)
            RETURNING {}
            "#,
            SCHOOL_COLUMNS
        );

        let row = sqlx::query_as::<_, SchoolRow>(&sql)
            .bind(id)
            .bind(update.theme_color.to_hex())
            .bind(update.logo_url)
            .bind(update.palette.as_deref().map(hex_list))
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => Err(self.missed_update(id, expected_version).await),
        }
    }

    async fn update_site(
        &self,
        id: Uuid,
        update: SiteUpdate,
        expected_version: Option<i64>,
    ) -> Result<School, StoreError> {
        let sql = format!(
            r#"
            UPDATE schools SET
                html_content = COALESCE($2, html_content),
                is_published = COALESCE($3, is_published),
                version = version + 1,
                updated_at = now()
            WHERE id = $1 AND ($4::bigint IS NULL OR version = $4)
            RETURNING {}
            "#,
            SCHOOL_COLUMNS
        );

        let row = sqlx::query_as::<_, SchoolRow>(&sql)
            .bind(id)
            .bind(update.html_content)
            .bind(update.is_published)
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => Err(self.missed_update(id, expected_version).await),
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
