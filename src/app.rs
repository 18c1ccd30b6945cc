use axum::{
    extract::DefaultBodyLimit,
    http::{header::X_CONTENT_TYPE_OPTIONS, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::auth::{JwtAuthority, JwtError};
use crate::branding::{ImageSource, PaletteExtractor};
use crate::config::{AppConfig, SecurityConfig};
use crate::database::SchoolStore;
use crate::handlers::{protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::services::{BlobStore, SchoolService, ThemeService};

/// Shared handles, built once at startup and cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn SchoolStore>,
    pub images: Arc<dyn ImageSource>,
    pub blobs: Arc<dyn BlobStore>,
    pub jwt: Arc<JwtAuthority>,
    pub extractor: PaletteExtractor,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn SchoolStore>,
        images: Arc<dyn ImageSource>,
        blobs: Arc<dyn BlobStore>,
    ) -> Result<Self, JwtError> {
        let jwt = JwtAuthority::from_config(&config.security)?;
        let extractor = PaletteExtractor::default().with_max_sample_dimension(config.theme.max_sample_dimension);

        Ok(Self {
            config: Arc::new(config),
            store,
            images,
            blobs,
            jwt: Arc::new(jwt),
            extractor,
        })
    }

    pub fn theme_service(&self) -> ThemeService {
        ThemeService::new(
            self.store.clone(),
            self.images.clone(),
            self.extractor.clone(),
            self.config.theme.clone(),
        )
    }

    pub fn school_service(&self) -> SchoolService {
        SchoolService::new(self.store.clone(), self.theme_service())
    }
}

/// Builds the full HTTP surface.
pub fn router(state: AppState) -> Router {
    let config = state.config.clone();

    let mut app = Router::new()
        .merge(public_routes())
        .merge(protected_routes(state.clone()));

    if let Some(mount) = local_storage_mount(&config.storage.public_base_url) {
        let storage = ServiceBuilder::new()
            .layer(SetResponseHeaderLayer::overriding(
                X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .service(ServeDir::new(&config.storage.root));
        app = app.nest_service(&mount, storage);
    }

    let app = app.layer(
        ServiceBuilder::new()
            .layer(cors_layer(&config.security))
            .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes)),
    );

    let app = if config.api.enable_request_logging {
        app.layer(TraceLayer::new_for_http())
    } else {
        app
    };

    app.with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/api/get-colors", get(public::colors_get).post(public::colors_post))
        .route("/sites/:slug", get(public::site_get))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/auth/whoami", get(protected::whoami))
        .route("/api/schools", post(protected::school_create))
        .route("/api/school", get(protected::school_get))
        .route("/api/school/theme", put(protected::theme_put))
        .route("/api/school/theme/recompute", post(protected::theme_recompute))
        .route("/api/school/logo", post(protected::logo_post))
        .route("/api/school/site", put(protected::site_put))
        .route("/api/update-and-check-contrast", post(protected::update_and_check_contrast))
        .route("/api/upload", post(protected::upload_post))
        .route_layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any)
}

/// Path to serve stored blobs from, when the public URL points back at this service.
fn local_storage_mount(public_base_url: &str) -> Option<String> {
    let url = url::Url::parse(public_base_url).ok()?;
    let path = url.path().trim_end_matches('/');
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_mount_comes_from_public_url_path() {
        assert_eq!(
            local_storage_mount("http://localhost:3000/storage/avatars/").as_deref(),
            Some("/storage/avatars")
        );
        assert_eq!(local_storage_mount("https://cdn.example.com/"), None);
        assert_eq!(local_storage_mount("not a url"), None);
    }
}
