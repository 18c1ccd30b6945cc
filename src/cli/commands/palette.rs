use clap::Args;
use serde_json::json;
use std::path::PathBuf;
use url::Url;

use crate::branding::{FetchedImage, HttpImageSource, ImageSource, PaletteExtractor};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Args)]
pub struct PaletteArgs {
    #[arg(help = "Image file path or http(s) URL")]
    pub source: String,

    #[arg(long, short = 'n', help = "Number of colors to return (1-16)")]
    pub count: Option<usize>,
}

pub async fn handle(args: PaletteArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    let image = load(&args.source, &config).await?;
    let count = args.count.unwrap_or(config.theme.palette_size);

    let extractor = PaletteExtractor::default().with_max_sample_dimension(config.theme.max_sample_dimension);
    let palette = extractor
        .extract_blocking(image.bytes, image.media_type.clone(), count)
        .await?;

    match output_format {
        OutputFormat::Json => output_success(
            &output_format,
            &format!("Extracted {} colors", palette.len()),
            Some(json!({ "media_type": image.media_type, "palette": palette })),
        ),
        OutputFormat::Text => {
            for (rank, color) in palette.colors().iter().enumerate() {
                println!("{:>2}. {}", rank + 1, color);
            }
            Ok(())
        }
    }
}

async fn load(source: &str, config: &AppConfig) -> anyhow::Result<FetchedImage> {
    if let Ok(url) = Url::parse(source) {
        if matches!(url.scheme(), "http" | "https") {
            let images = HttpImageSource::from_config(&config.theme)?;
            return Ok(images.fetch(&url).await?);
        }
    }

    let path = PathBuf::from(source);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    Ok(FetchedImage::from_upload(bytes, None)?)
}
