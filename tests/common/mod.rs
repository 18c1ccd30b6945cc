#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{http::header::CONTENT_TYPE, response::Redirect, routing::get, Router};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use reqwest::{RequestBuilder, Response};
use serde_json::{json, Value};
use tempfile::TempDir;
use uuid::Uuid;

use schoolbox_api::app::{router, AppState};
use schoolbox_api::auth::JwtAuthority;
use schoolbox_api::branding::HttpImageSource;
use schoolbox_api::config::AppConfig;
use schoolbox_api::database::InMemorySchoolStore;
use schoolbox_api::services::LocalBlobStore;

pub const NAVY: &str = "#0b1220";
pub const DEFAULT_COLOR: &str = "#06b6d4";

/// A schoolbox server on a loopback port backed by the in-memory store.
pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub store: Arc<InMemorySchoolStore>,
    pub jwt: JwtAuthority,
    _storage: TempDir,
}

impl TestApp {
    /// Server whose logo fetches may reach the loopback fixture host.
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(|config| config.theme.allow_private_image_hosts = true).await
    }

    pub async fn spawn_with(configure: impl FnOnce(&mut AppConfig)) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let storage = tempfile::tempdir()?;

        let mut config = AppConfig::development();
        config.storage.root = storage.path().join("avatars");
        config.storage.public_base_url = format!("{}/storage/avatars/", base_url);
        config.api.enable_request_logging = false;
        configure(&mut config);

        let store = Arc::new(InMemorySchoolStore::new());
        let images = HttpImageSource::from_config(&config.theme)?;
        let blobs = LocalBlobStore::from_config(&config.storage)?;
        let jwt = JwtAuthority::from_config(&config.security)?;

        let state = AppState::new(config, store.clone(), Arc::new(images), Arc::new(blobs))?;
        serve(router(state), port).await?;

        Ok(Self {
            base_url,
            client: reqwest::Client::new(),
            store,
            jwt,
            _storage: storage,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Bearer token for a fresh user id.
    pub fn new_user(&self) -> Result<(Uuid, String)> {
        let user = Uuid::new_v4();
        let token = self.jwt.issue(user, Some(format!("{}@school.test", user.simple())))?;
        Ok((user, token))
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.client.put(self.url(path))
    }

    /// Signs up a user and creates their school; returns the token and the school JSON.
    pub async fn school(&self, name: &str, slug: &str) -> Result<(String, Value)> {
        let (_, token) = self.new_user()?;
        let response = self
            .post("/api/schools")
            .bearer_auth(&token)
            .json(&json!({ "name": name, "slug": slug }))
            .send()
            .await?;
        anyhow::ensure!(response.status() == 201, "school signup failed: {}", response.status());
        let body: Value = response.json().await?;
        Ok((token, body["data"].clone()))
    }
}

/// Serves `app` on `port` for the rest of the test's runtime.
pub async fn serve(app: Router, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("failed to bind port {}", port))?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(())
}

/// Static image host standing in for a CDN.
///
/// - `/logo.png`   navy, cyan and white bands (navy wins on contrast)
/// - `/pale.png`   two light greys (nothing reaches 3:1 against white)
/// - `/blob`       the logo served as application/octet-stream
/// - `/notes.txt`  plain text
/// - `/moved.png`  302 to `/logo.png`
/// - `/away`       302 to a `file://` URL
/// - anything else 404
pub async fn spawn_image_host() -> Result<String> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;

    let logo = logo_png();
    let blob = logo.clone();
    let pale = png_with_bands(&[([238, 238, 238], 6), ([221, 221, 221], 4)]);

    let app = Router::new()
        .route("/logo.png", get(move || async move { ([(CONTENT_TYPE, "image/png")], logo) }))
        .route("/pale.png", get(move || async move { ([(CONTENT_TYPE, "image/png")], pale) }))
        .route(
            "/blob",
            get(move || async move { ([(CONTENT_TYPE, "application/octet-stream")], blob) }),
        )
        .route("/notes.txt", get(|| async { ([(CONTENT_TYPE, "text/plain")], "not an image") }))
        .route("/moved.png", get(|| async { Redirect::temporary("/logo.png") }))
        .route("/away", get(|| async { Redirect::temporary("file:///etc/passwd") }));

    serve(app, port).await?;
    Ok(format!("http://127.0.0.1:{}", port))
}

/// A loopback URL nothing is listening on.
pub fn unreachable_url() -> String {
    let port = portpicker::pick_unused_port().unwrap_or(9);
    format!("http://127.0.0.1:{}/logo.png", port)
}

pub fn logo_png() -> Vec<u8> {
    png_with_bands(&[([6, 182, 212], 5), ([11, 18, 32], 3), ([255, 255, 255], 2)])
}

/// PNG of horizontal bands, `rows` rows of 10 pixels each per color.
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

pub fn file_form(bytes: Vec<u8>, file_name: &str, mime: &str) -> Result<reqwest::multipart::Form> {
    let part = reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(mime)?;
    Ok(reqwest::multipart::Form::new().part("file", part))
}

pub async fn json_body(response: Response) -> Result<(u16, Value)> {
    let status = response.status().as_u16();
    let body = response.json().await.context("response was not JSON")?;
    Ok((status, body))
}
