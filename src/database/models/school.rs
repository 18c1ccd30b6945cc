use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::branding::Color;

/// A tenant: one school, administered by exactly one identity-provider user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct School {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
    pub theme_color: Option<Color>,
    pub theme_palette: Vec<Color>,
    pub is_published: bool,
    pub html_content: Option<String>,
    /// Bumped on every write; used as an optional write precondition.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The branding slice of a school record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandTheme {
    pub color: Option<Color>,
    pub logo_url: Option<String>,
    pub palette: Vec<Color>,
}

impl School {
    pub fn theme(&self) -> BrandTheme {
        BrandTheme {
            color: self.theme_color,
            logo_url: self.logo_url.clone(),
            palette: self.theme_palette.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSchool {
    pub admin_id: Uuid,
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
}

/// Theme write. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeUpdate {
    pub theme_color: Color,
    pub logo_url: Option<String>,
    pub palette: Option<Vec<Color>>,
}

/// Website builder write. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteUpdate {
    pub html_content: Option<String>,
    pub is_published: Option<bool>,
}

/// Row shape of the `schools` table; colors are stored as `#rrggbb` text.
#[derive(Debug, Clone, FromRow)]
pub struct SchoolRow {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
    pub theme_color: Option<String>,
    pub theme_palette: Vec<String>,
    pub is_published: bool,
    pub html_content: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SchoolRow> for School {
    fn from(row: SchoolRow) -> Self {
        // Unparseable stored colors are dropped rather than failing the read.
        let parse = |hex: &str| match hex.parse::<Color>() {
            Ok(color) => Some(color),
            Err(e) => {
                tracing::warn!("Ignoring stored color on school {}: {}", row.id, e);
                None
            }
        };

        School {
            id: row.id,
            admin_id: row.admin_id,
            theme_color: row.theme_color.as_deref().and_then(parse),
            theme_palette: row.theme_palette.iter().filter_map(|c| parse(c.as_str())).collect(),
            name: row.name,
            slug: row.slug,
            logo_url: row.logo_url,
            is_published: row.is_published,
            html_content: row.html_content,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
