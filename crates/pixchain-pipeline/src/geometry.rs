//! Geometric operations: mirroring and resizing.
//!
//! Both operations keep the buffer's [`ColorModel`](crate::ColorModel);
//! resampling is delegated to [`image::imageops`] through
//! [`DynamicImage`](image::DynamicImage).

use std::fmt;
use std::str::FromStr;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, PipelineError, PixelBuffer};

/// Axis (or axes) to mirror across.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipDirection {
    /// Mirror left-to-right.
    Horizontal,
    /// Mirror top-to-bottom.
    Vertical,
    /// Mirror on both axes (a 180 degree rotation).
    Both,
}

impl FlipDirection {
    /// Every accepted direction, in menu order.
    pub const ALL: [Self; 3] = [Self::Horizontal, Self::Vertical, Self::Both];

    /// Lowercase name as accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for FlipDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FlipDirection {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                PipelineError::invalid(format!(
                    "invalid flip direction '{s}' (expected horizontal, vertical or both)"
                ))
            })
    }
}

/// Mirror an image.
///
/// [`FlipDirection::Both`] applies the horizontal flip and then the
/// vertical one; the two commute, so the order is not observable.
#[must_use = "returns the flipped image"]
pub fn flip(image: &PixelBuffer, direction: FlipDirection) -> PixelBuffer {
    let img = image.as_dynamic();
    let flipped = match direction {
        FlipDirection::Horizontal => img.fliph(),
        FlipDirection::Vertical => img.flipv(),
        FlipDirection::Both => img.fliph().flipv(),
    };
    PixelBuffer::from(flipped)
}

/// Interpolation rule used when resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleKernel {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation.
    #[default]
    Bilinear,
    /// Bicubic (Catmull-Rom).
    Bicubic,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos,
}

impl ResampleKernel {
    /// Every accepted kernel, in menu order.
    pub const ALL: [Self; 4] = [Self::Nearest, Self::Bilinear, Self::Bicubic, Self::Lanczos];

    /// Lowercase name as accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
            Self::Bicubic => "bicubic",
            Self::Lanczos => "lanczos",
        }
    }

    /// Convert to the `image` crate's `FilterType`.
    const fn to_image_filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Bilinear => FilterType::Triangle,
            Self::Bicubic => FilterType::CatmullRom,
            Self::Lanczos => FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResampleKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResampleKernel {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                PipelineError::invalid(format!(
                    "invalid resample filter '{s}' (expected nearest, bilinear, bicubic or lanczos)"
                ))
            })
    }
}

/// How the output size of [`scale`] is derived.
///
/// Construct through [`ScaleMode::factor`] or [`ScaleMode::fit_within`]
/// (or serde, which runs the same checks), so a mode that reaches
/// [`scale`] is always usable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScaleModeRepr", into = "ScaleModeRepr")]
pub enum ScaleMode {
    /// Multiply both axes by the factor, flooring the result.
    Factor(f64),
    /// Largest aspect-preserving size that fits inside the box.
    FitWithin {
        /// Box width in pixels.
        width: u32,
        /// Box height in pixels.
        height: u32,
    },
}

impl ScaleMode {
    /// Factor mode.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] unless `factor` is
    /// finite and positive.
    pub fn factor(factor: f64) -> Result<Self, PipelineError> {
        if factor.is_finite() && factor > 0.0 {
            Ok(Self::Factor(factor))
        } else {
            Err(PipelineError::invalid(format!(
                "scale factor must be positive, got {factor}"
            )))
        }
    }

    /// Fit-within-box mode.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] if either side is zero.
    pub fn fit_within(width: u32, height: u32) -> Result<Self, PipelineError> {
        if width == 0 || height == 0 {
            return Err(PipelineError::invalid(format!(
                "bounding box must be at least 1x1, got {width}x{height}"
            )));
        }
        Ok(Self::FitWithin { width, height })
    }

    /// Output size for a source image of the given size.
    ///
    /// Factor mode: `floor(W*f) x floor(H*f)`. Fit-within mode:
    /// `ratio = min(boxW/W, boxH/H)` and `floor(W*ratio) x floor(H*ratio)`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::suboptimal_flops
    )]
    pub fn target_dimensions(self, source: Dimensions) -> Dimensions {
        let (w, h) = (f64::from(source.width), f64::from(source.height));
        let ratio = match self {
            Self::Factor(f) => f,
            Self::FitWithin { width, height } => {
                (f64::from(width) / w).min(f64::from(height) / h)
            }
        };
        // `as` saturates, and the floor is applied explicitly.
        Dimensions {
            width: (w * ratio).floor() as u32,
            height: (h * ratio).floor() as u32,
        }
    }
}

impl fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Factor(factor) => write!(f, "{factor}x"),
            Self::FitWithin { width, height } => write!(f, "{width}px {height}px"),
        }
    }
}

/// Serde-compatible proxy for [`ScaleMode`], validated on the way in.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ScaleModeRepr {
    Factor(f64),
    FitWithin { width: u32, height: u32 },
}

impl TryFrom<ScaleModeRepr> for ScaleMode {
    type Error = PipelineError;

    fn try_from(repr: ScaleModeRepr) -> Result<Self, Self::Error> {
        match repr {
            ScaleModeRepr::Factor(f) => Self::factor(f),
            ScaleModeRepr::FitWithin { width, height } => Self::fit_within(width, height),
        }
    }
}

impl From<ScaleMode> for ScaleModeRepr {
    fn from(mode: ScaleMode) -> Self {
        match mode {
            ScaleMode::Factor(f) => Self::Factor(f),
            ScaleMode::FitWithin { width, height } => Self::FitWithin { width, height },
        }
    }
}

/// Resize an image.
///
/// With `mode == None` the input is returned unchanged and no resampling
/// takes place.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] if the source image is
/// empty, the computed size would be zero on either axis, or it would
/// exceed [`Dimensions::MAX_PIXELS`].
pub fn scale(
    image: &PixelBuffer,
    mode: Option<ScaleMode>,
    kernel: ResampleKernel,
) -> Result<PixelBuffer, PipelineError> {
    let Some(mode) = mode else {
        return Ok(image.clone());
    };

    let source = image.dimensions();
    if source.width == 0 || source.height == 0 {
        return Err(PipelineError::invalid("cannot scale an empty image"));
    }

    let target = mode.target_dimensions(source);
    if target.width == 0 || target.height == 0 {
        return Err(PipelineError::invalid(format!(
            "scaling {}x{} by {mode} yields an empty image",
            source.width, source.height
        )));
    }
    let target = target.within_budget()?;

    let resized = image
        .as_dynamic()
        .resize_exact(target.width, target.height, kernel.to_image_filter());
    Ok(PixelBuffer::from(resized))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{ColorModel, RgbImage, RgbaImage};

    #[allow(clippy::cast_possible_truncation)]
    fn gradient(w: u32, h: u32) -> PixelBuffer {
        PixelBuffer::rgb(RgbImage::from_fn(w, h, |x, y| {
            image::Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn horizontal_flip_mirrors_columns() {
        let img = gradient(5, 3);
        let flipped = flip(&img, FlipDirection::Horizontal).to_rgb8();
        let src = img.to_rgb8();
        for y in 0..3 {
            for x in 0..5 {
                assert_eq!(flipped.get_pixel(x, y), src.get_pixel(4 - x, y));
            }
        }
    }

    #[test]
    fn vertical_flip_mirrors_rows() {
        let img = gradient(5, 3);
        let flipped = flip(&img, FlipDirection::Vertical).to_rgb8();
        let src = img.to_rgb8();
        for y in 0..3 {
            for x in 0..5 {
                assert_eq!(flipped.get_pixel(x, y), src.get_pixel(x, 2 - y));
            }
        }
    }

    #[test]
    fn flip_both_equals_composed_flips() {
        let img = gradient(6, 4);
        let both = flip(&img, FlipDirection::Both);
        let composed = flip(&flip(&img, FlipDirection::Vertical), FlipDirection::Horizontal);
        assert_eq!(both, composed);
    }

    #[test]
    fn flip_preserves_alpha_layout() {
        let img = PixelBuffer::rgba(RgbaImage::from_pixel(3, 3, image::Rgba([1, 2, 3, 4])));
        assert_eq!(flip(&img, FlipDirection::Both).color_model(), ColorModel::Rgba);
    }

    #[test]
    fn unknown_direction_is_rejected() {
        let err = "diagonal".parse::<FlipDirection>().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
        assert_eq!("Vertical".parse::<FlipDirection>().unwrap(), FlipDirection::Vertical);
    }

    #[test]
    fn scale_by_factor() {
        let img = gradient(200, 100);
        let scaled = scale(&img, Some(ScaleMode::factor(1.5).unwrap()), ResampleKernel::Bilinear).unwrap();
        assert_eq!(scaled.dimensions(), Dimensions { width: 300, height: 150 });
    }

    #[test]
    fn scale_factor_floors() {
        let mode = ScaleMode::factor(0.33).unwrap();
        let target = mode.target_dimensions(Dimensions { width: 10, height: 7 });
        assert_eq!(target, Dimensions { width: 3, height: 2 });
    }

    #[test]
    fn scale_to_fit_bounding_box() {
        let img = gradient(200, 100);
        let a = scale(&img, Some(ScaleMode::fit_within(80, 60).unwrap()), ResampleKernel::Bilinear).unwrap();
        assert_eq!(a.dimensions(), Dimensions { width: 80, height: 40 });
        let b = scale(&img, Some(ScaleMode::fit_within(150, 50).unwrap()), ResampleKernel::Bilinear).unwrap();
        assert_eq!(b.dimensions(), Dimensions { width: 100, height: 50 });
    }

    #[test]
    fn no_mode_is_identity() {
        let img = gradient(20, 10);
        let out = scale(&img, None, ResampleKernel::Lanczos).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn every_kernel_resizes() {
        let img = gradient(200, 100);
        for kernel in ResampleKernel::ALL {
            let out = scale(&img, Some(ScaleMode::factor(0.5).unwrap()), kernel).unwrap();
            assert_eq!(out.dimensions(), Dimensions { width: 100, height: 50 }, "{kernel}");
        }
    }

    #[test]
    fn unknown_kernel_is_rejected() {
        let err = "invalid_filter".parse::<ResampleKernel>().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }

    #[test]
    fn invalid_modes_are_rejected_at_construction() {
        assert!(ScaleMode::factor(0.0).is_err());
        assert!(ScaleMode::factor(-2.0).is_err());
        assert!(ScaleMode::factor(f64::NAN).is_err());
        assert!(ScaleMode::fit_within(0, 10).is_err());
    }

    #[test]
    fn collapse_to_zero_is_an_error() {
        let img = gradient(4, 4);
        let result = scale(&img, Some(ScaleMode::factor(0.1).unwrap()), ResampleKernel::Nearest);
        assert!(matches!(result, Err(PipelineError::InvalidArgument(_))));
    }

    #[test]
    fn oversized_targets_are_rejected() {
        let img = gradient(10, 10);
        let huge_factor = scale(&img, Some(ScaleMode::factor(1e12).unwrap()), ResampleKernel::Nearest);
        assert!(matches!(huge_factor, Err(PipelineError::InvalidArgument(_))));

        let huge_box = ScaleMode::fit_within(100_000, 100_000).unwrap();
        let result = scale(&img, Some(huge_box), ResampleKernel::Nearest);
        assert!(matches!(result, Err(PipelineError::InvalidArgument(_))));
    }

    #[test]
    fn deserialization_validates() {
        let ok: ScaleMode = serde_json::from_str(r#"{"fit_within":{"width":80,"height":60}}"#).unwrap();
        assert_eq!(ok, ScaleMode::FitWithin { width: 80, height: 60 });
        let bad = serde_json::from_str::<ScaleMode>(r#"{"factor":-1.0}"#);
        assert!(bad.is_err());
    }
}
