use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::branding::Color;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub theme: ThemeConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `None` selects the in-memory store (development only).
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    /// Expected `aud` claim; hosted identity providers usually send "authenticated".
    pub jwt_audience: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    pub palette_size: usize,
    /// Text/background color the accent has to stay readable against.
    pub reference_color: Color,
    pub min_contrast: f64,
    /// Applied whenever extraction fails or nothing meets `min_contrast`.
    pub default_color: Color,
    pub fetch_timeout_secs: u64,
    pub max_image_bytes: usize,
    pub max_sample_dimension: u32,
    /// Lets logo fetches reach loopback and private networks. Off outside local setups.
    #[serde(default)]
    pub allow_private_image_hosts: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub root: PathBuf,
    /// Public URL prefix the blob root is served under, with trailing slash.
    pub public_base_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v).filter(|s| !s.trim().is_empty());
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Some(v) = env::var("SCHOOLBOX_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("JWT_AUDIENCE") {
            self.security.jwt_audience = Some(v).filter(|s| !s.is_empty());
        }

        // Theme overrides
        if let Ok(v) = env::var("THEME_PALETTE_SIZE") {
            self.theme.palette_size = v.parse().unwrap_or(self.theme.palette_size);
        }
        if let Ok(v) = env::var("THEME_REFERENCE_COLOR") {
            self.theme.reference_color = v.parse().unwrap_or(self.theme.reference_color);
        }
        if let Ok(v) = env::var("THEME_MIN_CONTRAST") {
            self.theme.min_contrast = v.parse().unwrap_or(self.theme.min_contrast);
        }
        if let Ok(v) = env::var("THEME_DEFAULT_COLOR") {
            self.theme.default_color = v.parse().unwrap_or(self.theme.default_color);
        }
        if let Ok(v) = env::var("THEME_FETCH_TIMEOUT_SECS") {
            self.theme.fetch_timeout_secs = v.parse().unwrap_or(self.theme.fetch_timeout_secs);
        }
        if let Ok(v) = env::var("THEME_MAX_IMAGE_BYTES") {
            self.theme.max_image_bytes = v.parse().unwrap_or(self.theme.max_image_bytes);
        }
        if let Ok(v) = env::var("THEME_MAX_SAMPLE_DIMENSION") {
            self.theme.max_sample_dimension = v.parse().unwrap_or(self.theme.max_sample_dimension);
        }
        if let Ok(v) = env::var("THEME_ALLOW_PRIVATE_IMAGE_HOSTS") {
            self.theme.allow_private_image_hosts = v.parse().unwrap_or(self.theme.allow_private_image_hosts);
        }

        // Storage overrides
        if let Ok(v) = env::var("STORAGE_ROOT") {
            self.storage.root = PathBuf::from(v);
        }
        if let Ok(v) = env::var("STORAGE_PUBLIC_BASE_URL") {
            self.storage.public_base_url = v;
        }

        self
    }

    /// Rejects combinations the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        if self.environment != Environment::Development && self.database.url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        if !(1.0..=21.0).contains(&self.theme.min_contrast) {
            return Err(ConfigError::Invalid {
                field: "THEME_MIN_CONTRAST",
                reason: format!("{} is outside 1.0..=21.0", self.theme.min_contrast),
            });
        }
        if self.theme.palette_size == 0 {
            return Err(ConfigError::Invalid {
                field: "THEME_PALETTE_SIZE",
                reason: "must be at least 1".to_string(),
            });
        }
        url::Url::parse(&self.storage.public_base_url).map_err(|e| ConfigError::Invalid {
            field: "STORAGE_PUBLIC_BASE_URL",
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn theme_defaults() -> ThemeConfig {
        ThemeConfig {
            palette_size: 5,
            reference_color: Color::WHITE,
            min_contrast: 3.0,
            default_color: Color::rgb(0x06, 0xb6, 0xd4),
            fetch_timeout_secs: 10,
            max_image_bytes: 8 * 1024 * 1024, // 8MB
            max_sample_dimension: 256,
            allow_private_image_hosts: false,
        }
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["*".to_string()],
                jwt_secret: "schoolbox-development-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                jwt_audience: None,
            },
            theme: Self::theme_defaults(),
            storage: StorageConfig {
                root: PathBuf::from("storage/avatars"),
                public_base_url: "http://localhost:3000/storage/avatars/".to_string(),
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                jwt_audience: Some("authenticated".to_string()),
            },
            theme: Self::theme_defaults(),
            storage: StorageConfig {
                root: PathBuf::from("/var/lib/schoolbox/avatars"),
                public_base_url: "https://staging.example.com/storage/avatars/".to_string(),
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: false,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                jwt_audience: Some("authenticated".to_string()),
            },
            theme: ThemeConfig {
                fetch_timeout_secs: 5,
                ..Self::theme_defaults()
            },
            storage: StorageConfig {
                root: PathBuf::from("/var/lib/schoolbox/avatars"),
                public_base_url: "https://app.example.com/storage/avatars/".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(config.database.url.is_none());
        assert_eq!(config.theme.palette_size, 5);
        assert_eq!(config.theme.reference_color, Color::WHITE);
        assert_eq!(config.theme.min_contrast, 3.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.api.enable_request_logging);
        assert_eq!(config.security.jwt_audience.as_deref(), Some("authenticated"));
        assert!(matches!(config.validate(), Err(ConfigError::Missing("JWT_SECRET"))));
    }

    #[test]
    fn production_requires_database_url() {
        let mut config = AppConfig::production();
        config.security.jwt_secret = "s3cret".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Missing("DATABASE_URL"))));

        config.database.url = Some("postgres://localhost/schoolbox".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_contrast() {
        let mut config = AppConfig::development();
        config.theme.min_contrast = 25.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "THEME_MIN_CONTRAST", .. })));
    }
}
