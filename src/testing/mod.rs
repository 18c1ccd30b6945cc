//! Fixtures shared by unit tests.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

use crate::branding::{FetchedImage, ImageSource, PaletteError};
use crate::database::{NewSchool, School, SchoolStore, SiteUpdate, StoreError, ThemeUpdate};

/// PNG made of horizontal bands, `rows` rows of 10 pixels each per color.
pub fn png_with_bands(bands: &[([u8; 3], u32)]) -> Vec<u8> {
    let height: u32 = bands.iter().map(|(_, rows)| rows).sum();
    let mut image = RgbImage::new(10, height.max(1));

    let mut y = 0;
    for (color, rows) in bands {
        for row in y..y + rows {
            for x in 0..10 {
                image.put_pixel(x, row, Rgb(*color));
            }
        }
        y += rows;
    }

    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

/// ImageSource returning canned bytes (or a fetch failure) and counting calls.
#[derive(Clone)]
pub struct StubImageSource {
    png: Option<Vec<u8>>,
    fetches: Arc<AtomicUsize>,
}

impl StubImageSource {
    pub fn serving(png: Vec<u8>) -> Self {
        Self {
            png: Some(png),
            fetches: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            png: None,
            fetches: Arc::default(),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageSource for StubImageSource {
    async fn fetch(&self, url: &Url) -> Result<FetchedImage, PaletteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match &self.png {
            Some(png) => Ok(FetchedImage {
                bytes: png.clone(),
                media_type: "image/png".to_string(),
            }),
            None => Err(PaletteError::FetchFailed(format!("{} is unreachable", url))),
        }
    }
}

/// Store that can read one school but fails every write.
pub struct FailingStore {
    school: School,
}

impl FailingStore {
    pub fn with_school(school: School) -> Self {
        Self { school }
    }

    fn lookup(&self, matches: bool) -> Result<Option<School>, StoreError> {
        Ok(matches.then(|| self.school.clone()))
    }
}

#[async_trait]
impl SchoolStore for FailingStore {
    async fn insert(&self, _school: NewSchool) -> Result<School, StoreError> {
        Err(StoreError::Sqlx(sqlx::Error::PoolTimedOut))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<School>, StoreError> {
        self.lookup(self.school.id == id)
    }

    async fn find_by_admin(&self, admin_id: Uuid) -> Result<Option<School>, StoreError> {
        self.lookup(self.school.admin_id == admin_id)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<School>, StoreError> {
        self.lookup(self.school.slug == slug)
    }

    async fn update_theme(&self, _id: Uuid, _update: ThemeUpdate, _version: Option<i64>) -> Result<School, StoreError> {
        Err(StoreError::Sqlx(sqlx::Error::PoolTimedOut))
    }

    async fn update_site(&self, _id: Uuid, _update: SiteUpdate, _version: Option<i64>) -> Result<School, StoreError> {
        Err(StoreError::Sqlx(sqlx::Error::PoolTimedOut))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Err(StoreError::Sqlx(sqlx::Error::PoolTimedOut))
    }
}
