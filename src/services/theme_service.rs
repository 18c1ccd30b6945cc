use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::auth::Principal;
use crate::branding::{Color, ContrastPolicy, FetchedImage, ImageSource, PaletteError, PaletteExtractor};
use crate::config::ThemeConfig;
use crate::database::{School, SchoolStore, StoreError, ThemeUpdate};

use super::school_service::NO_SCHOOL_MESSAGE;

#[derive(Debug, thiserror::Error)]
pub enum ThemeError {
    #[error("{0}")]
    TenantNotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Failed to persist theme: {0}")]
    PersistenceFailure(#[from] StoreError),
}

/// Which school a theme operation is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantTarget {
    /// The school administered by the acting principal.
    Owned,
    /// An explicit school, which the principal must administer.
    Id(Uuid),
}

impl From<Option<Uuid>> for TenantTarget {
    fn from(id: Option<Uuid>) -> Self {
        id.map(TenantTarget::Id).unwrap_or(TenantTarget::Owned)
    }
}

/// How the persisted accent color was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeSource {
    /// Highest-contrast qualifying palette entry.
    Extracted,
    /// Neutral default, because extraction failed or nothing qualified.
    Fallback,
    /// Picked by the admin.
    Manual,
}

/// Result of a theme write.
#[derive(Debug, Clone)]
pub struct ThemeOutcome {
    pub school: School,
    pub color: Color,
    pub source: ThemeSource,
}

/// Accent color and palette derived from one logo.
#[derive(Debug, Clone, PartialEq)]
struct Derived {
    color: Color,
    palette: Vec<Color>,
    source: ThemeSource,
}

/// Orchestrates fetch → extract → select → persist for one school's brand theme.
pub struct ThemeService {
    store: Arc<dyn SchoolStore>,
    images: Arc<dyn ImageSource>,
    extractor: PaletteExtractor,
    settings: ThemeConfig,
}

impl ThemeService {
    pub fn new(
        store: Arc<dyn SchoolStore>,
        images: Arc<dyn ImageSource>,
        extractor: PaletteExtractor,
        settings: ThemeConfig,
    ) -> Self {
        Self {
            store,
            images,
            extractor,
            settings,
        }
    }

    fn policy(&self) -> ContrastPolicy {
        ContrastPolicy::new(self.settings.reference_color, self.settings.min_contrast)
    }

    /// Resolves `target` and checks that `principal` administers it.
    pub async fn authorize(&self, principal: &Principal, target: TenantTarget) -> Result<School, ThemeError> {
        match target {
            TenantTarget::Owned => self
                .store
                .find_by_admin(principal.user_id)
                .await?
                .ok_or_else(|| {
                    warn!("User {} does not administer any school", principal.user_id);
                    ThemeError::Unauthorized(NO_SCHOOL_MESSAGE.to_string())
                }),
            TenantTarget::Id(id) => {
                let school = self
                    .store
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| ThemeError::TenantNotFound(format!("School {} not found", id)))?;

                if school.admin_id != principal.user_id {
                    warn!("User {} attempted to modify school {}", principal.user_id, id);
                    return Err(ThemeError::Unauthorized(
                        "You are not the administrator of this school.".to_string(),
                    ));
                }
                Ok(school)
            }
        }
    }

    /// Fetches `image_url`, derives the accent color and stores both as the
    /// school's theme. Fetch and extraction failures fall back to the default color.
    pub async fn apply_from_url(
        &self,
        principal: &Principal,
        target: TenantTarget,
        image_url: &str,
    ) -> Result<ThemeOutcome, ThemeError> {
        let school = self.authorize(principal, target).await?;
        self.brand_from_url(&school, image_url).await
    }

    /// Admin override; not subject to the contrast threshold.
    pub async fn apply_manual(
        &self,
        principal: &Principal,
        target: TenantTarget,
        color: Color,
        expected_version: Option<i64>,
    ) -> Result<ThemeOutcome, ThemeError> {
        let school = self.authorize(principal, target).await?;

        let update = ThemeUpdate {
            theme_color: color,
            logo_url: None,
            palette: None,
        };
        let updated = self.store.update_theme(school.id, update, expected_version).await?;

        info!("Applied manual theme {} to school {}", color, updated.slug);
        Ok(ThemeOutcome {
            school: updated,
            color,
            source: ThemeSource::Manual,
        })
    }

    /// Re-runs the pipeline against the stored logo.
    pub async fn recompute(&self, principal: &Principal, target: TenantTarget) -> Result<ThemeOutcome, ThemeError> {
        let school = self.authorize(principal, target).await?;
        match school.logo_url.clone() {
            Some(logo_url) => self.brand_from_url(&school, &logo_url).await,
            None => {
                let derived = self.fallback("school has no logo");
                self.persist(&school, derived, None).await
            }
        }
    }

    /// Runs the pipeline for a school the caller is already known to administer.
    pub async fn brand_from_url(&self, school: &School, image_url: &str) -> Result<ThemeOutcome, ThemeError> {
        let image = match Url::parse(image_url) {
            Ok(url) => self.images.fetch(&url).await,
            Err(e) => Err(PaletteError::FetchFailed(format!("invalid image URL: {}", e))),
        };
        let derived = self.derive(image).await;
        self.persist(school, derived, Some(image_url.to_string())).await
    }

    /// Runs the pipeline on bytes already in hand; `logo_url` is where they are stored.
    pub async fn brand_from_image(
        &self,
        school: &School,
        image: Result<FetchedImage, PaletteError>,
        logo_url: String,
    ) -> Result<ThemeOutcome, ThemeError> {
        let derived = self.derive(image).await;
        self.persist(school, derived, Some(logo_url)).await
    }

    async fn derive(&self, image: Result<FetchedImage, PaletteError>) -> Derived {
        let image = match image {
            Ok(image) => image,
            Err(e) => return self.fallback(&e.to_string()),
        };

        let palette = match self
            .extractor
            .extract_blocking(image.bytes, image.media_type, self.settings.palette_size)
            .await
        {
            Ok(palette) => palette,
            Err(e) => return self.fallback(&e.to_string()),
        };

        match self.policy().select(palette.colors()) {
            Some(best) => {
                debug!("Selected {} at contrast {:.2}", best.color, best.ratio);
                Derived {
                    color: best.color,
                    palette: palette.into_colors(),
                    source: ThemeSource::Extracted,
                }
            }
            None => {
                warn!(
                    "No palette color reaches {:.1}:1 against {}; using default {}",
                    self.settings.min_contrast, self.settings.reference_color, self.settings.default_color
                );
                Derived {
                    color: self.settings.default_color,
                    palette: palette.into_colors(),
                    source: ThemeSource::Fallback,
                }
            }
        }
    }

    fn fallback(&self, reason: &str) -> Derived {
        warn!("Theme extraction degraded ({}); using default {}", reason, self.settings.default_color);
        Derived {
            color: self.settings.default_color,
            palette: Vec::new(),
            source: ThemeSource::Fallback,
        }
    }

    async fn persist(
        &self,
        school: &School,
        derived: Derived,
        logo_url: Option<String>,
    ) -> Result<ThemeOutcome, ThemeError> {
        let update = ThemeUpdate {
            theme_color: derived.color,
            logo_url,
            palette: Some(derived.palette),
        };

        let updated = self.store.update_theme(school.id, update, None).await.map_err(|e| {
            error!("Failed to persist theme for school {}: {}", school.id, e);
            ThemeError::PersistenceFailure(e)
        })?;

        info!(
            "Applied {:?} theme {} to school {}",
            derived.source, derived.color, updated.slug
        );
        Ok(ThemeOutcome {
            school: updated,
            color: derived.color,
            source: derived.source,
        })
    }
}
