//! Tonal operations: per-pixel color transforms.
//!
//! Grayscale conversion uses the ITU-R 601 luma weights
//! `0.299*R + 0.587*G + 0.114*B`, rounded half-up. The `image` crate's
//! own `to_luma8` uses Rec. 709 weights, so the conversion is done here.
//!
//! Inversion and the three level adjustments only touch color samples;
//! alpha passes through unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{GrayImage, PipelineError, PixelBuffer, RgbImage, RgbaImage};

/// Luminance of one RGB sample, rounded to the nearest integer.
#[must_use]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    // The weights sum to 1000, so the result is at most 255.
    u8::try_from((weighted + 500) / 1000).unwrap_or(u8::MAX)
}

/// Convert an image to single-channel luminance.
///
/// Alpha is dropped. Luminance input is returned as-is.
#[must_use = "returns the grayscale image"]
pub fn grayscale(image: &PixelBuffer) -> PixelBuffer {
    PixelBuffer::luma(to_gray(image))
}

/// Luminance plane of any buffer, shared with the edge detectors.
pub(crate) fn to_gray(image: &PixelBuffer) -> GrayImage {
    if let Some(gray) = image.as_luma() {
        return gray.clone();
    }
    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        image::Luma([luma(r, g, b)])
    })
}

/// Invert every color sample (`255 - v`). Alpha is untouched.
#[must_use = "returns the inverted image"]
pub fn invert_colors(image: &PixelBuffer) -> PixelBuffer {
    map_color_samples(image, |_, v| 255 - v)
}

/// A strength for [`adjust_brightness`], [`adjust_contrast`] and
/// [`adjust_saturation`], in `[-100, 100]`.
///
/// The matching multiplicative factor is `1 + level/100`, so `0` is the
/// identity, `-100` collapses the adjustment completely and `100`
/// doubles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Level(i8);

impl Level {
    /// Smallest accepted level.
    pub const MIN: i64 = -100;
    /// Largest accepted level.
    pub const MAX: i64 = 100;

    /// Validate a level.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] outside `[-100, 100]`.
    pub fn new(level: i64) -> Result<Self, PipelineError> {
        if !(Self::MIN..=Self::MAX).contains(&level) {
            return Err(PipelineError::invalid(format!(
                "level {level} is out of range [{}, {}]",
                Self::MIN,
                Self::MAX
            )));
        }
        i8::try_from(level)
            .map(Self)
            .map_err(|e| PipelineError::invalid(e.to_string()))
    }

    /// The raw level.
    #[must_use]
    pub const fn get(self) -> i8 {
        self.0
    }

    /// `true` for level `0`.
    #[must_use]
    pub const fn is_identity(self) -> bool {
        self.0 == 0
    }

    /// The multiplicative factor `1 + level/100`.
    #[must_use]
    pub fn factor(self) -> f64 {
        1.0 + f64::from(self.0) / 100.0
    }
}

impl TryFrom<i64> for Level {
    type Error = PipelineError;

    fn try_from(level: i64) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl From<Level> for i64 {
    fn from(level: Level) -> Self {
        Self::from(level.0)
    }
}

impl std::str::FromStr for Level {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level: i64 = s
            .trim()
            .parse()
            .map_err(|_| PipelineError::invalid(format!("level '{s}' is not an integer")))?;
        Self::new(level)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Scale every color sample by the level's factor.
#[must_use = "returns the adjusted image"]
pub fn adjust_brightness(image: &PixelBuffer, level: Level) -> PixelBuffer {
    if level.is_identity() {
        return image.clone();
    }
    let f = level.factor();
    map_color_samples(image, |_, v| clamp_round(f64::from(v) * f))
}

/// Stretch (or compress) every color sample around the channel
/// midpoint [`CONTRAST_MIDPOINT`].
#[must_use = "returns the adjusted image"]
pub fn adjust_contrast(image: &PixelBuffer, level: Level) -> PixelBuffer {
    if level.is_identity() {
        return image.clone();
    }
    let f = level.factor();
    map_color_samples(image, |_, v| {
        clamp_round((f64::from(v) - CONTRAST_MIDPOINT).mul_add(f, CONTRAST_MIDPOINT))
    })
}

/// Pivot used by [`adjust_contrast`].
pub const CONTRAST_MIDPOINT: f64 = 128.0;

/// Blend each pixel toward (`level < 0`) or away from (`level > 0`)
/// its own luminance. Luminance images have no chroma, so they are
/// returned unchanged.
#[must_use = "returns the adjusted image"]
pub fn adjust_saturation(image: &PixelBuffer, level: Level) -> PixelBuffer {
    if level.is_identity() || image.as_luma().is_some() {
        return image.clone();
    }
    let f = level.factor();
    map_color_samples(image, |[r, g, b], v| {
        let gray = f64::from(luma(r, g, b));
        clamp_round((f64::from(v) - gray).mul_add(f, gray))
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_round(v: f64) -> u8 {
    // Clamped into u8 range first, so the cast is exact.
    v.round().clamp(0.0, 255.0) as u8
}

/// Apply `f(rgb, sample)` to each color sample, keeping alpha.
///
/// `rgb` is the whole source pixel so that transforms which need the
/// pixel's luminance can compute it. For luminance buffers `rgb` is the
/// gray value replicated.
fn map_color_samples<F>(image: &PixelBuffer, f: F) -> PixelBuffer
where
    F: Fn([u8; 3], u8) -> u8,
{
    if let Some(gray) = image.as_luma() {
        let out = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            let v = gray.get_pixel(x, y).0[0];
            image::Luma([f([v, v, v], v)])
        });
        return PixelBuffer::luma(out);
    }

    if image.color_model() == crate::types::ColorModel::Rgba {
        let src = image.to_rgba8();
        let out = RgbaImage::from_fn(src.width(), src.height(), |x, y| {
            let [r, g, b, a] = src.get_pixel(x, y).0;
            let rgb = [r, g, b];
            image::Rgba([f(rgb, r), f(rgb, g), f(rgb, b), a])
        });
        return PixelBuffer::rgba(out);
    }

    let src = image.to_rgb8();
    let out = RgbImage::from_fn(src.width(), src.height(), |x, y| {
        let rgb = src.get_pixel(x, y).0;
        image::Rgb(rgb.map(|v| f(rgb, v)))
    });
    PixelBuffer::rgb(out)
}
