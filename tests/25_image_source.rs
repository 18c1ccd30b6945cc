mod common;

use std::time::Duration;

use anyhow::Result;
use common::{spawn_image_host, unreachable_url};
use schoolbox_api::branding::{HttpImageSource, ImageSource, PaletteError};
use url::Url;

// The fixture host is on loopback.
fn source(max_bytes: usize) -> Result<HttpImageSource> {
    Ok(HttpImageSource::new(Duration::from_secs(5), max_bytes)?.allow_private_hosts(true))
}

#[tokio::test]
async fn fetches_bytes_with_declared_type() -> Result<()> {
    let host = spawn_image_host().await?;
    let image = source(1 << 20)?.fetch(&Url::parse(&format!("{}/logo.png", host))?).await?;

    assert_eq!(image.media_type, "image/png");
    assert_eq!(image.bytes, common::logo_png());
    Ok(())
}

#[tokio::test]
async fn octet_stream_is_sniffed() -> Result<()> {
    let host = spawn_image_host().await?;
    let image = source(1 << 20)?.fetch(&Url::parse(&format!("{}/blob", host))?).await?;
    assert_eq!(image.media_type, "image/png");
    Ok(())
}

#[tokio::test]
async fn non_success_status_is_fetch_failure() -> Result<()> {
    let host = spawn_image_host().await?;
    let err = source(1 << 20)?
        .fetch(&Url::parse(&format!("{}/missing.png", host))?)
        .await
        .unwrap_err();
    assert!(matches!(err, PaletteError::FetchFailed(_)));
    Ok(())
}

#[tokio::test]
async fn unreachable_host_is_fetch_failure() -> Result<()> {
    let err = source(1 << 20)?.fetch(&Url::parse(&unreachable_url())?).await.unwrap_err();
    assert!(matches!(err, PaletteError::FetchFailed(_)));
    Ok(())
}

#[tokio::test]
async fn oversized_images_are_refused() -> Result<()> {
    let host = spawn_image_host().await?;
    let err = source(16)?
        .fetch(&Url::parse(&format!("{}/logo.png", host))?)
        .await
        .unwrap_err();
    assert!(matches!(err, PaletteError::FetchFailed(_)));
    Ok(())
}

#[tokio::test]
async fn follows_redirects() -> Result<()> {
    let host = spawn_image_host().await?;
    let image = source(1 << 20)?.fetch(&Url::parse(&format!("{}/moved.png", host))?).await?;
    assert_eq!(image.media_type, "image/png");
    Ok(())
}

#[tokio::test]
async fn redirect_hops_are_checked() -> Result<()> {
    let host = spawn_image_host().await?;
    let err = source(1 << 20)?
        .fetch(&Url::parse(&format!("{}/away", host))?)
        .await
        .unwrap_err();
    assert!(matches!(&err, PaletteError::FetchFailed(msg) if msg.contains("scheme")), "{}", err);
    Ok(())
}

#[tokio::test]
async fn private_hosts_are_refused_by_default() -> Result<()> {
    let host = spawn_image_host().await?;
    let strict = HttpImageSource::new(Duration::from_secs(5), 1 << 20)?;
    let err = strict
        .fetch(&Url::parse(&format!("{}/logo.png", host))?)
        .await
        .unwrap_err();
    assert!(matches!(err, PaletteError::FetchFailed(_)));
    Ok(())
}
