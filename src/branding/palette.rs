//! Dominant-color extraction.
//!
//! Decoding is handled by the `image` crate; quantization is delegated to a
//! [`PaletteStrategy`]. The default strategy buckets pixels into a coarse RGB
//! histogram, folds buckets whose mean colors are close together, and ranks
//! the survivors by pixel weight.

use image::{DynamicImage, ImageError, ImageFormat};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use super::color::Color;

/// Default number of palette entries returned.
pub const DEFAULT_PALETTE_SIZE: usize = 5;
/// Upper bound on requested palette entries.
pub const MAX_PALETTE_SIZE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaletteError {
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("failed to fetch image: {0}")]
    FetchFailed(String),

    #[error("failed to decode image: {0}")]
    DecodeFailed(String),
}

/// Non-empty list of colors ordered by descending prevalence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Palette(Vec<Color>);

impl Palette {
    /// Fails with `DecodeFailed` on an empty list so a successful palette is never empty.
    pub fn new(colors: Vec<Color>) -> Result<Self, PaletteError> {
        if colors.is_empty() {
            return Err(PaletteError::DecodeFailed("image contains no opaque pixels".to_string()));
        }
        Ok(Self(colors))
    }

    pub fn colors(&self) -> &[Color] {
        &self.0
    }

    pub fn dominant(&self) -> Color {
        self.0[0]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, color: &Color) -> bool {
        self.0.contains(color)
    }

    pub fn into_colors(self) -> Vec<Color> {
        self.0
    }
}

/// Reduces RGB samples to at most `max_colors` representative colors,
/// ordered by descending weight. Near-duplicates must be merged.
pub trait PaletteStrategy: Send + Sync {
    fn quantize(&self, samples: &[[u8; 3]], max_colors: usize) -> Vec<Color>;
}

/// Frequency-bucket histogram with near-duplicate merging.
#[derive(Debug, Clone)]
pub struct HistogramQuantizer {
    /// Significant bits kept per channel when bucketing.
    pub bits_per_channel: u8,
    /// Buckets whose means are within this RGB distance are folded together.
    pub merge_distance: f64,
}

impl Default for HistogramQuantizer {
    fn default() -> Self {
        Self {
            bits_per_channel: 5,
            merge_distance: 28.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    key: u32,
    count: u64,
    sums: [u64; 3],
}

impl Bucket {
    fn mean(&self) -> Color {
        let avg = |sum: u64| ((sum as f64 / self.count as f64).round()).clamp(0.0, 255.0) as u8;
        Color::rgb(avg(self.sums[0]), avg(self.sums[1]), avg(self.sums[2]))
    }

    fn absorb(&mut self, other: &Bucket) {
        self.count += other.count;
        for (acc, add) in self.sums.iter_mut().zip(other.sums) {
            *acc += add;
        }
    }
}

impl HistogramQuantizer {
    fn bucket_key(&self, [r, g, b]: [u8; 3]) -> u32 {
        let bits = self.bits_per_channel.clamp(1, 8) as u32;
        let shift = 8 - bits;
        ((r as u32 >> shift) << (2 * bits)) | ((g as u32 >> shift) << bits) | (b as u32 >> shift)
    }
}

impl PaletteStrategy for HistogramQuantizer {
    fn quantize(&self, samples: &[[u8; 3]], max_colors: usize) -> Vec<Color> {
        if samples.is_empty() || max_colors == 0 {
            return Vec::new();
        }

        let mut histogram: HashMap<u32, Bucket> = HashMap::new();
        for &sample in samples {
            let key = self.bucket_key(sample);
            let bucket = histogram.entry(key).or_insert(Bucket { key, ..Bucket::default() });
            bucket.count += 1;
            for (acc, channel) in bucket.sums.iter_mut().zip(sample) {
                *acc += channel as u64;
            }
        }

        // HashMap order is random; key breaks count ties so output is deterministic.
        let mut buckets: Vec<Bucket> = histogram.into_values().collect();
        buckets.sort_by(|a, b| b.count.cmp(&a.count).then(a.key.cmp(&b.key)));

        let threshold = (self.merge_distance * self.merge_distance) as u32;
        let mut clusters: Vec<Bucket> = Vec::new();
        for bucket in &buckets {
            let mean = bucket.mean();
            match clusters
                .iter_mut()
                .find(|cluster| cluster.mean().distance_squared(&mean) <= threshold)
            {
                Some(cluster) => cluster.absorb(bucket),
                None => clusters.push(*bucket),
            }
        }

        // Folding moves cluster means, so two clusters can drift within range
        // of each other; keep merging the closest such pair until none remain.
        while let Some((keep, fold)) = closest_pair_within(&clusters, threshold) {
            let folded = clusters.remove(fold);
            clusters[keep].absorb(&folded);
        }

        // stable: equal weights keep first-seen order
        clusters.sort_by(|a, b| b.count.cmp(&a.count));
        clusters.truncate(max_colors);
        clusters.iter().map(Bucket::mean).collect()
    }
}

/// Indices `(i, j)`, `i < j`, of the closest pair of clusters within `threshold`.
fn closest_pair_within(clusters: &[Bucket], threshold: u32) -> Option<(usize, usize)> {
    let means: Vec<Color> = clusters.iter().map(Bucket::mean).collect();
    let mut best: Option<(u32, usize, usize)> = None;
    for i in 0..means.len() {
        for j in i + 1..means.len() {
            let d = means[i].distance_squared(&means[j]);
            if d <= threshold && best.map_or(true, |(bd, _, _)| d < bd) {
                best = Some((d, i, j));
            }
        }
    }
    best.map(|(_, i, j)| (i, j))
}

/// Decodes images and runs the configured [`PaletteStrategy`].
#[derive(Clone)]
pub struct PaletteExtractor {
    strategy: Arc<dyn PaletteStrategy>,
    max_sample_dimension: u32,
    min_alpha: u8,
}

impl Default for PaletteExtractor {
    fn default() -> Self {
        Self::new(Arc::new(HistogramQuantizer::default()))
    }
}

impl std::fmt::Debug for PaletteExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaletteExtractor")
            .field("max_sample_dimension", &self.max_sample_dimension)
            .field("min_alpha", &self.min_alpha)
            .finish_non_exhaustive()
    }
}

impl PaletteExtractor {
    pub fn new(strategy: Arc<dyn PaletteStrategy>) -> Self {
        Self {
            strategy,
            max_sample_dimension: 256,
            min_alpha: 125,
        }
    }

    /// Images larger than this on either side are downsampled before bucketing.
    pub fn with_max_sample_dimension(mut self, dimension: u32) -> Self {
        self.max_sample_dimension = dimension.max(1);
        self
    }

    /// Decodes `bytes` as `media_type` and returns up to `count` dominant colors.
    pub fn extract(&self, bytes: &[u8], media_type: &str, count: usize) -> Result<Palette, PaletteError> {
        let image = decode_image(bytes, media_type)?;
        let image = if image.width() > self.max_sample_dimension || image.height() > self.max_sample_dimension {
            image.thumbnail(self.max_sample_dimension, self.max_sample_dimension)
        } else {
            image
        };

        let samples: Vec<[u8; 3]> = image
            .to_rgba8()
            .pixels()
            .filter(|px| px.0[3] >= self.min_alpha)
            .map(|px| [px.0[0], px.0[1], px.0[2]])
            .collect();

        tracing::debug!(
            "Sampling {} opaque pixels from {}x{} {} image",
            samples.len(),
            image.width(),
            image.height(),
            media_type
        );

        self.quantize(&samples, count)
    }

    /// Extracts from a raw, tightly packed RGB buffer (`len % 3 == 0`).
    pub fn extract_rgb(&self, rgb: &[u8], count: usize) -> Result<Palette, PaletteError> {
        if rgb.len() % 3 != 0 {
            return Err(PaletteError::DecodeFailed(format!(
                "RGB buffer length {} is not a multiple of 3",
                rgb.len()
            )));
        }
        let samples: Vec<[u8; 3]> = rgb.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
        self.quantize(&samples, count)
    }

    /// [`extract`](Self::extract) on the blocking thread pool.
    pub async fn extract_blocking(
        &self,
        bytes: Vec<u8>,
        media_type: String,
        count: usize,
    ) -> Result<Palette, PaletteError> {
        let extractor = self.clone();
        tokio::task::spawn_blocking(move || extractor.extract(&bytes, &media_type, count))
            .await
            .map_err(|e| PaletteError::DecodeFailed(format!("extraction task failed: {}", e)))?
    }

    fn quantize(&self, samples: &[[u8; 3]], count: usize) -> Result<Palette, PaletteError> {
        let count = clamp_palette_size(count);
        let mut colors = self.strategy.quantize(samples, count);
        colors.truncate(count);
        Palette::new(colors)
    }
}

pub fn clamp_palette_size(count: usize) -> usize {
    count.clamp(1, MAX_PALETTE_SIZE)
}

/// Lowercased essence of a media type, without parameters.
pub fn normalize_media_type(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn decode_image(bytes: &[u8], media_type: &str) -> Result<DynamicImage, PaletteError> {
    let essence = normalize_media_type(media_type);
    let format = ImageFormat::from_mime_type(&essence)
        .ok_or_else(|| PaletteError::UnsupportedMediaType(media_type.to_string()))?;

    image::load_from_memory_with_format(bytes, format).map_err(|e| match e {
        ImageError::Unsupported(_) => PaletteError::UnsupportedMediaType(essence.clone()),
        other => PaletteError::DecodeFailed(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn rgb_buffer(runs: &[([u8; 3], usize)]) -> Vec<u8> {
        runs.iter()
            .flat_map(|(color, n)| std::iter::repeat(*color).take(*n))
            .flatten()
            .collect()
    }

    fn encode(image: RgbaImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image).write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn orders_colors_by_pixel_weight() {
        let buffer = rgb_buffer(&[([200, 30, 30], 10), ([20, 40, 200], 50), ([30, 180, 60], 25)]);
        let palette = PaletteExtractor::default().extract_rgb(&buffer, 5).unwrap();
        assert_eq!(
            palette.colors(),
            &[Color::rgb(20, 40, 200), Color::rgb(30, 180, 60), Color::rgb(200, 30, 30)]
        );
        assert_eq!(palette.dominant(), Color::rgb(20, 40, 200));
    }

    #[test]
    fn merges_near_duplicate_colors() {
        // different histogram buckets, but only ~11 apart in RGB space
        let buffer = rgb_buffer(&[([10, 20, 200], 30), ([17, 25, 207], 30), ([240, 240, 240], 40)]);
        let palette = PaletteExtractor::default().extract_rgb(&buffer, 5).unwrap();
        assert_eq!(palette.len(), 2);
        assert_eq!(palette.dominant(), Color::rgb(14, 23, 204));
        assert_eq!(palette.colors()[1], Color::rgb(240, 240, 240));
    }

    #[test]
    fn drifting_cluster_means_are_merged() {
        // greedy folding leaves two clusters 27 apart unless they are re-merged
        let buffer = rgb_buffer(&[
            ([100, 100, 100], 100),
            ([100, 100, 73], 99),
            ([100, 100, 128], 98),
            ([100, 100, 110], 97),
            ([100, 100, 120], 96),
        ]);
        let quantizer = HistogramQuantizer::default();
        let palette = PaletteExtractor::default().extract_rgb(&buffer, 5).unwrap();

        let min_gap = (quantizer.merge_distance * quantizer.merge_distance) as u32;
        for (i, a) in palette.colors().iter().enumerate() {
            for b in &palette.colors()[i + 1..] {
                assert!(a.distance_squared(b) > min_gap, "{} and {} should have merged", a, b);
            }
        }
        assert_eq!(palette.colors(), &[Color::rgb(100, 100, 106)]);
    }

    #[test]
    fn never_exceeds_requested_count_and_never_empty() {
        let extractor = PaletteExtractor::default();
        let mut buffer = Vec::new();
        for i in 0..64u8 {
            buffer.extend_from_slice(&[i.wrapping_mul(37), i.wrapping_mul(91), i.wrapping_mul(13)]);
        }

        for count in [1, 2, 3, 5, 8] {
            let palette = extractor.extract_rgb(&buffer, count).unwrap();
            assert!(palette.len() <= count, "count {count} gave {}", palette.len());
            assert!(!palette.is_empty());
        }

        let single = extractor.extract_rgb(&[9, 9, 9], 5).unwrap();
        assert_eq!(single.colors(), &[Color::rgb(9, 9, 9)]);
    }

    #[test]
    fn zero_count_is_treated_as_one() {
        let buffer = rgb_buffer(&[([0, 0, 0], 3), ([255, 255, 255], 1)]);
        let palette = PaletteExtractor::default().extract_rgb(&buffer, 0).unwrap();
        assert_eq!(palette.colors(), &[Color::BLACK]);
    }

    #[test]
    fn rejects_empty_and_ragged_buffers() {
        let extractor = PaletteExtractor::default();
        assert!(matches!(extractor.extract_rgb(&[], 5), Err(PaletteError::DecodeFailed(_))));
        assert!(matches!(extractor.extract_rgb(&[1, 2], 5), Err(PaletteError::DecodeFailed(_))));
    }

    #[test]
    fn decodes_png_and_skips_transparent_pixels() {
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 0]));
        for x in 0..20 {
            for y in 0..5 {
                img.put_pixel(x, y, Rgba([11, 18, 32, 255]));
            }
        }
        let png = encode(img, ImageFormat::Png);

        let palette = PaletteExtractor::default().extract(&png, "image/png", 5).unwrap();
        assert_eq!(palette.colors(), &[Color::rgb(11, 18, 32)]);
    }

    #[test]
    fn downsamples_large_images() {
        let img = RgbaImage::from_fn(600, 300, |x, _| {
            if x < 400 {
                Rgba([6, 182, 212, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let png = encode(img, ImageFormat::Png);

        let extractor = PaletteExtractor::default().with_max_sample_dimension(64);
        let palette = extractor.extract(&png, "image/png; charset=binary", 3).unwrap();
        let cyan = Color::rgb(6, 182, 212);
        assert!(palette.dominant().distance_squared(&cyan) <= 64, "{}", palette.dominant());
        assert!(palette.colors().iter().any(|c| c.distance_squared(&Color::WHITE) <= 64));
    }

    #[test]
    fn fully_transparent_image_fails_explicitly() {
        let png = encode(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 0])), ImageFormat::Png);
        let err = PaletteExtractor::default().extract(&png, "image/png", 5).unwrap_err();
        assert!(matches!(err, PaletteError::DecodeFailed(_)));
    }

    #[test]
    fn unknown_media_type_is_unsupported() {
        let err = PaletteExtractor::default()
            .extract(b"<svg/>", "image/svg+xml", 5)
            .unwrap_err();
        assert_eq!(err, PaletteError::UnsupportedMediaType("image/svg+xml".to_string()));

        let err = PaletteExtractor::default().extract(b"hello", "text/plain", 5).unwrap_err();
        assert!(matches!(err, PaletteError::UnsupportedMediaType(_)));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = PaletteExtractor::default()
            .extract(b"definitely not a png", "image/png", 5)
            .unwrap_err();
        assert!(matches!(err, PaletteError::DecodeFailed(_)));
    }

    #[test]
    fn normalizes_media_type_parameters() {
        assert_eq!(normalize_media_type("Image/PNG; charset=binary"), "image/png");
        assert_eq!(normalize_media_type(""), "");
    }

    #[tokio::test]
    async fn blocking_extraction_matches_inline() {
        let png = encode(RgbaImage::from_pixel(8, 8, Rgba([6, 182, 212, 255])), ImageFormat::Png);
        let extractor = PaletteExtractor::default();

        let inline = extractor.extract(&png, "image/png", 5).unwrap();
        let pooled = extractor.extract_blocking(png, "image/png".to_string(), 5).await.unwrap();
        assert_eq!(inline, pooled);
    }
}
