use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::school::{NewSchool, School, SiteUpdate, ThemeUpdate};
use super::store::{SchoolStore, StoreError};

/// Process-local SchoolStore used for development without a database and in tests.
#[derive(Clone, Default)]
pub struct InMemorySchoolStore {
    schools: Arc<RwLock<HashMap<Uuid, School>>>,
}

impl InMemorySchoolStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.schools.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.schools.read().await.is_empty()
    }

    /// Applies `mutate` under the write lock, enforcing the version precondition.
    async fn write(
        &self,
        id: Uuid,
        expected_version: Option<i64>,
        mutate: impl FnOnce(&mut School),
    ) -> Result<School, StoreError> {
        let mut schools = self.schools.write().await;
        let school = schools
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("school {}", id)))?;

        if let Some(expected) = expected_version {
            if school.version != expected {
                return Err(StoreError::VersionMismatch {
                    expected,
                    actual: school.version,
                });
            }
        }

        mutate(school);
        school.version += 1;
        school.updated_at = Utc::now();
        Ok(school.clone())
    }
}

#[async_trait]
impl SchoolStore for InMemorySchoolStore {
    async fn insert(&self, new: NewSchool) -> Result<School, StoreError> {
        let mut schools = self.schools.write().await;

        if schools.values().any(|s| s.slug == new.slug) {
            return Err(StoreError::Conflict("slug is already taken".to_string()));
        }
        if schools.values().any(|s| s.admin_id == new.admin_id) {
            return Err(StoreError::Conflict("user already administers a school".to_string()));
        }

        let now = Utc::now();
        let school = School {
            id: Uuid::new_v4(),
            admin_id: new.admin_id,
            name: new.name,
            slug: new.slug,
            logo_url: new.logo_url,
            theme_color: None,
            theme_palette: Vec::new(),
            is_published: false,
            html_content: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        schools.insert(school.id, school.clone());
        Ok(school)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<School>, StoreError> {
        Ok(self.schools.read().await.get(&id).cloned())
    }

    async fn find_by_admin(&self, admin_id: Uuid) -> Result<Option<School>, StoreError> {
        Ok(self
            .schools
            .read()
            .await
            .values()
            .find(|s| s.admin_id == admin_id)
            .cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<School>, StoreError> {
        Ok(self.schools.read().await.values().find(|s| s.slug == slug).cloned())
    }

    async fn update_theme(
        &self,
        id: Uuid,
        update: ThemeUpdate,
        expected_version: Option<i64>,
    ) -> Result<School, StoreError> {
        self.write(id, expected_version, |school| {
            school.theme_color = Some(update.theme_color);
            if let Some(logo_url) = update.logo_url {
                school.logo_url = Some(logo_url);
            }
            if let Some(palette) = update.palette {
                school.theme_palette = palette;
            }
        })
        .await
    }

    async fn update_site(
        &self,
        id: Uuid,
        update: SiteUpdate,
        expected_version: Option<i64>,
    ) -> Result<School, StoreError> {
        self.write(id, expected_version, |school| {
            if let Some(html) = update.html_content {
                school.html_content = Some(html);
            }
            if let Some(published) = update.is_published {
                school.is_published = published;
            }
        })
        .await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
