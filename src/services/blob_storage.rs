use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::info;
use url::Url;

use crate::config::StorageConfig;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("Invalid public base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A stored object and the URL it is publicly served from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredBlob {
    pub key: String,
    pub url: String,
}

/// Public object storage for uploaded files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, file_name: &str, bytes: &[u8]) -> Result<StoredBlob, BlobError>;
}

/// Stores objects as files under a directory served at `public_base_url`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: Url,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Result<Self, BlobError> {
        let mut base = public_base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let public_base_url = Url::parse(&base).map_err(|e| BlobError::InvalidBaseUrl(e.to_string()))?;

        Ok(Self {
            root: root.into(),
            public_base_url,
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, BlobError> {
        Self::new(config.root.clone(), &config.public_base_url)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, file_name: &str, bytes: &[u8]) -> Result<StoredBlob, BlobError> {
        let key = object_key(file_name, bytes)?;

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(&key), bytes).await?;

        let url = self
            .public_base_url
            .join(&key)
            .map_err(|e| BlobError::InvalidBaseUrl(e.to_string()))?;

        info!("Stored {} ({} bytes)", key, bytes.len());
        Ok(StoredBlob {
            key,
            url: url.to_string(),
        })
    }
}

/// `<first 16 hex chars of sha256(bytes)>_<sanitised name>`; identical
/// uploads land on the same key.
pub fn object_key(file_name: &str, bytes: &[u8]) -> Result<String, BlobError> {
    let name = sanitize_file_name(file_name)?;
    let digest = format!("{:x}", Sha256::digest(bytes));
    Ok(format!("{}_{}", &digest[..16], name))
}

fn sanitize_file_name(file_name: &str) -> Result<String, BlobError> {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        return Err(BlobError::InvalidName(file_name.to_string()));
    }
    Ok(cleaned.chars().take(100).collect())
}
