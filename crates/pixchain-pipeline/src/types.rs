//! Shared types for the pixchain operation pipeline.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference edge maps
/// without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` for the windowed detector's color input.
pub use image::RgbImage;

/// Re-export `RgbaImage` for background removal adapters.
pub use image::RgbaImage;

/// The color layout of a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorModel {
    /// Single-channel luminance.
    Luma,
    /// Three color channels.
    Rgb,
    /// Three color channels plus alpha.
    Rgba,
}

impl ColorModel {
    /// Number of samples stored per pixel.
    #[must_use]
    pub const fn channels(self) -> u8 {
        match self {
            Self::Luma => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Largest pixel count an operation may produce (256 Mi pixels, 1 GiB
    /// as RGBA).
    pub const MAX_PIXELS: u64 = 1 << 28;

    /// Total number of pixels.
    #[must_use]
    pub fn pixels(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Reject sizes above [`Self::MAX_PIXELS`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] if the size is too large.
    pub fn within_budget(self) -> Result<Self, PipelineError> {
        if self.pixels() > Self::MAX_PIXELS {
            return Err(PipelineError::invalid(format!(
                "{}x{} exceeds the limit of {} pixels",
                self.width,
                self.height,
                Self::MAX_PIXELS
            )));
        }
        Ok(self)
    }
}

/// An in-memory 8-bit raster image.
///
/// Only three layouts are admitted: `L8`, `Rgb8` and `Rgba8`. Every other
/// [`DynamicImage`] variant is normalised on the way in (gray+alpha and
/// 16-bit/float images become `Rgba8` or `Rgb8`), so operations only have
/// to handle the three [`ColorModel`]s.
///
/// Operations borrow a buffer and return a new one. A failed operation
/// never touches its input, which is what lets the pipeline skip it and
/// keep going with the previous stage's buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer(DynamicImage);

impl PixelBuffer {
    /// Wrap a single-channel image.
    #[must_use]
    pub fn luma(image: GrayImage) -> Self {
        Self(DynamicImage::ImageLuma8(image))
    }

    /// Wrap a three-channel image.
    #[must_use]
    pub fn rgb(image: RgbImage) -> Self {
        Self(DynamicImage::ImageRgb8(image))
    }

    /// Wrap a three-channel image with alpha.
    #[must_use]
    pub fn rgba(image: RgbaImage) -> Self {
        Self(DynamicImage::ImageRgba8(image))
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Width and height together.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width(),
            height: self.height(),
        }
    }

    /// The buffer's color layout.
    #[must_use]
    pub fn color_model(&self) -> ColorModel {
        match self.0 {
            DynamicImage::ImageLuma8(_) => ColorModel::Luma,
            DynamicImage::ImageRgba8(_) => ColorModel::Rgba,
            // Construction only admits the three 8-bit layouts.
            _ => ColorModel::Rgb,
        }
    }

    /// Borrow the underlying image, e.g. for encoding.
    #[must_use]
    pub const fn as_dynamic(&self) -> &DynamicImage {
        &self.0
    }

    /// Borrow the single-channel image, if this is a luminance buffer.
    #[must_use]
    pub fn as_luma(&self) -> Option<&GrayImage> {
        match &self.0 {
            DynamicImage::ImageLuma8(img) => Some(img),
            _ => None,
        }
    }

    /// Convert to three-channel color, replicating luminance and
    /// dropping alpha as needed.
    #[must_use]
    pub fn to_rgb8(&self) -> RgbImage {
        self.0.to_rgb8()
    }

    /// Convert to three-channel color with alpha (opaque if the buffer
    /// has no alpha channel).
    #[must_use]
    pub fn to_rgba8(&self) -> RgbaImage {
        self.0.to_rgba8()
    }
}

impl From<DynamicImage> for PixelBuffer {
    fn from(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => {
                Self(image)
            }
            DynamicImage::ImageLuma16(_) => Self(DynamicImage::ImageLuma8(image.to_luma8())),
            other if other.color().has_alpha() => Self(DynamicImage::ImageRgba8(other.to_rgba8())),
            other => Self(DynamicImage::ImageRgb8(other.to_rgb8())),
        }
    }
}

impl From<GrayImage> for PixelBuffer {
    fn from(image: GrayImage) -> Self {
        Self::luma(image)
    }
}

impl From<RgbImage> for PixelBuffer {
    fn from(image: RgbImage) -> Self {
        Self::rgb(image)
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        Self::rgba(image)
    }
}

/// Errors that can occur while building or applying operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// An operation parameter is malformed or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation name does not match any known kind.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// The background removal adapter reported a failure.
    #[error("background removal failed: {0}")]
    BackgroundRemoval(String),

    /// The operation needs a collaborator that is not configured.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl PipelineError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
