// branding/mod.rs - Logo-driven brand color pipeline
//
// fetch image → extract palette → pick accent by contrast → persist theme
//
// The first three stages live here and are free of persistence concerns;
// the write step is services::theme_service.

pub mod color;
pub mod contrast;
pub mod palette;
pub mod source;

pub use color::{Color, ParseColorError};
pub use contrast::{contrast_ratio, relative_luminance, select_best_contrast, ContrastPolicy, ContrastScore};
pub use palette::{HistogramQuantizer, Palette, PaletteError, PaletteExtractor, PaletteStrategy};
pub use source::{FetchedImage, HttpImageSource, ImageSource};
