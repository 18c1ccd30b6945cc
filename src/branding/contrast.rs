//! WCAG 2.x relative luminance and contrast ratio, plus the accent selector
//! that picks the most readable palette entry against a reference color.

use serde::{Deserialize, Serialize};

use super::color::Color;

/// WCAG AA threshold for large text and UI components.
pub const WCAG_AA_LARGE_TEXT: f64 = 3.0;
/// WCAG AA threshold for body text.
pub const WCAG_AA_NORMAL_TEXT: f64 = 4.5;
/// WCAG AAA threshold for body text.
pub const WCAG_AAA_NORMAL_TEXT: f64 = 7.0;

fn linear_channel(value: u8) -> f64 {
    let channel = value as f64 / 255.0;
    if channel <= 0.03928 {
        channel / 12.92
    } else {
        ((channel + 0.055) / 1.055).powf(2.4)
    }
}

/// Relative luminance in `0.0..=1.0`.
pub fn relative_luminance(color: Color) -> f64 {
    0.2126 * linear_channel(color.r) + 0.7152 * linear_channel(color.g) + 0.0722 * linear_channel(color.b)
}

/// Contrast ratio in `1.0..=21.0`. Symmetric in its arguments.
pub fn contrast_ratio(a: Color, b: Color) -> f64 {
    let la = relative_luminance(a);
    let lb = relative_luminance(b);
    let (lighter, darker) = if la >= lb { (la, lb) } else { (lb, la) };
    (lighter + 0.05) / (darker + 0.05)
}

/// A palette entry paired with its contrast against the policy's reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContrastScore {
    pub color: Color,
    pub ratio: f64,
}

/// Reference color and minimum ratio an accent must reach.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContrastPolicy {
    pub reference: Color,
    pub min_ratio: f64,
}

impl Default for ContrastPolicy {
    fn default() -> Self {
        Self {
            reference: Color::WHITE,
            min_ratio: WCAG_AA_LARGE_TEXT,
        }
    }
}

impl ContrastPolicy {
    pub fn new(reference: Color, min_ratio: f64) -> Self {
        Self { reference, min_ratio }
    }

    /// Scores every entry, preserving palette order.
    pub fn score(&self, palette: &[Color]) -> Vec<ContrastScore> {
        palette
            .iter()
            .map(|&color| ContrastScore {
                color,
                ratio: contrast_ratio(color, self.reference),
            })
            .collect()
    }

    /// Highest-contrast entry at or above `min_ratio`; the earliest entry wins ties.
    /// `None` means no entry qualifies, which is a normal outcome.
    pub fn select(&self, palette: &[Color]) -> Option<ContrastScore> {
        self.select_position(palette).map(|(_, score)| score)
    }

    /// Like [`select`](Self::select) but also reports the winning palette index.
    pub fn select_position(&self, palette: &[Color]) -> Option<(usize, ContrastScore)> {
        let mut best: Option<(usize, ContrastScore)> = None;
        for (index, candidate) in self.score(palette).into_iter().enumerate() {
            if candidate.ratio < self.min_ratio {
                continue;
            }
            match best {
                Some((_, current)) if candidate.ratio <= current.ratio => {}
                _ => best = Some((index, candidate)),
            }
        }
        best
    }
}

/// Convenience wrapper over [`ContrastPolicy::select`].
pub fn select_best_contrast(palette: &[Color], reference: Color, min_ratio: f64) -> Option<Color> {
    ContrastPolicy::new(reference, min_ratio).select(palette).map(|score| score.color)
}
