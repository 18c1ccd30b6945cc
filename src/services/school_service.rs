use std::sync::Arc;
use tracing::{error, info};
use url::Url;

use crate::auth::Principal;
use crate::database::{NewSchool, School, SchoolStore, SiteUpdate, StoreError};

use super::theme_service::ThemeService;

pub const NO_SCHOOL_MESSAGE: &str = "Could not find an associated school for the user.";

#[derive(Debug, thiserror::Error)]
pub enum SchoolError {
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SchoolError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => SchoolError::Conflict(msg),
            StoreError::NotFound(msg) => SchoolError::NotFound(msg),
            other => SchoolError::Store(other),
        }
    }
}

/// Signup input.
#[derive(Debug, Clone, Default)]
pub struct SchoolSignup {
    pub name: String,
    pub slug: Option<String>,
    pub logo_url: Option<String>,
}

/// Website builder save.
#[derive(Debug, Clone)]
pub struct SiteDraft {
    pub html: String,
    pub publish: bool,
    pub expected_version: Option<i64>,
}

/// School signup, dashboard reads and the website builder.
pub struct SchoolService {
    store: Arc<dyn SchoolStore>,
    theme: ThemeService,
}

impl SchoolService {
    pub fn new(store: Arc<dyn SchoolStore>, theme: ThemeService) -> Self {
        Self { store, theme }
    }

    /// Creates the principal's school and, when a logo is given, brands it.
    pub async fn create_school(&self, principal: &Principal, signup: SchoolSignup) -> Result<School, SchoolError> {
        let name = validate_name(&signup.name)?;
        let slug = match signup.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(slug) => slug.to_ascii_lowercase(),
            None => slugify(&name),
        };
        validate_slug(&slug)?;

        let logo_url = signup
            .logo_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(validate_logo_url)
            .transpose()?;

        let school = self
            .store
            .insert(NewSchool {
                admin_id: principal.user_id,
                name,
                slug,
                logo_url: logo_url.clone(),
            })
            .await?;
        info!("School '{}' created by {}", school.slug, principal.user_id);

        let Some(logo_url) = logo_url else {
            return Ok(school);
        };

        // The school exists either way; a failed theme write leaves it unbranded.
        match self.theme.brand_from_url(&school, &logo_url).await {
            Ok(outcome) => Ok(outcome.school),
            Err(e) => {
                error!("Branding new school '{}' failed: {}", school.slug, e);
                Ok(school)
            }
        }
    }

    pub async fn my_school(&self, principal: &Principal) -> Result<School, SchoolError> {
        self.store
            .find_by_admin(principal.user_id)
            .await?
            .ok_or_else(|| SchoolError::NotFound(NO_SCHOOL_MESSAGE.to_string()))
    }

    /// Stores the builder's HTML and sets the published flag.
    pub async fn save_site(&self, principal: &Principal, draft: SiteDraft) -> Result<School, SchoolError> {
        let school = self.my_school(principal).await?;

        let update = SiteUpdate {
            html_content: Some(draft.html),
            is_published: Some(draft.publish),
        };
        let updated = self
            .store
            .update_site(school.id, update, draft.expected_version)
            .await?;

        info!(
            "Saved site for '{}' (published: {})",
            updated.slug, updated.is_published
        );
        Ok(updated)
    }

    /// HTML of a published school site.
    pub async fn published_site(&self, slug: &str) -> Result<String, SchoolError> {
        let school = self.store.find_by_slug(slug).await?;
        school
            .filter(|s| s.is_published)
            .and_then(|s| s.html_content)
            .ok_or_else(|| SchoolError::NotFound(format!("No published site for '{}'", slug)))
    }
}

fn validate_name(name: &str) -> Result<String, SchoolError> {
    let name = name.trim();
    let len = name.chars().count();
    if !(2..=100).contains(&len) {
        return Err(SchoolError::Invalid {
            field: "name",
            reason: "must be between 2 and 100 characters".to_string(),
        });
    }
    Ok(name.to_string())
}

/// Lowercase, ASCII alphanumerics joined by single hyphens.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    slug.chars().take(63).collect::<String>().trim_end_matches('-').to_string()
}

pub fn validate_slug(slug: &str) -> Result<(), SchoolError> {
    let invalid = |reason: &str| SchoolError::Invalid {
        field: "slug",
        reason: reason.to_string(),
    };

    if !(2..=63).contains(&slug.len()) {
        return Err(invalid("must be between 2 and 63 characters"));
    }
    if !slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err(invalid("may only contain lowercase letters, digits and hyphens"));
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(invalid("must not start or end with a hyphen"));
    }
    Ok(())
}

fn validate_logo_url(raw: &str) -> Result<String, SchoolError> {
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(raw.to_string()),
        _ => Err(SchoolError::Invalid {
            field: "logoUrl",
            reason: "must be an absolute http(s) URL".to_string(),
        }),
    }
}
