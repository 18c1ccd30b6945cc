// handlers/form.rs - Multipart upload parsing shared by upload endpoints

use axum::extract::Multipart;
use std::path::Path;

use crate::branding::{FetchedImage, PaletteError};
use crate::error::ApiError;

/// A file part from a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Image view of the upload; the declared content type is sniffed when generic.
    pub fn to_image(&self) -> Result<FetchedImage, PaletteError> {
        FetchedImage::from_upload(self.bytes.clone(), self.content_type.as_deref())
    }

    /// Accepts only bytes in a known raster format and renames the file to that
    /// format's extension, so stored blobs are never served as markup.
    pub fn require_image(self) -> Result<UploadedFile, ApiError> {
        let format = image::guess_format(&self.bytes)
            .map_err(|_| ApiError::field_error("file", "must be a PNG, JPEG, GIF or WebP image"))?;
        let extension = format.extensions_str().first().copied().unwrap_or("img");
        let stem = Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("upload");

        Ok(UploadedFile {
            file_name: format!("{}.{}", stem, extension),
            content_type: Some(format.to_mime_type().to_string()),
            bytes: self.bytes,
        })
    }
}

/// Recognised fields: `file` and an optional numeric `count`.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub count: Option<usize>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("file") => {
                    let file_name = field.file_name().unwrap_or("upload").to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?.to_vec();
                    form.file = Some(UploadedFile {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
                Some("count") => {
                    let text = field.text().await?;
                    let count = text
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| ApiError::field_error("count", "must be a positive integer"))?;
                    form.count = Some(count);
                }
                _ => {}
            }
        }

        Ok(form)
    }

    /// The `file` part, or 400 when it is missing or empty.
    pub fn require_file(self) -> Result<UploadedFile, ApiError> {
        match self.file {
            Some(file) if !file.bytes.is_empty() => Ok(file),
            _ => Err(ApiError::bad_request("No file uploaded")),
        }
    }
}
