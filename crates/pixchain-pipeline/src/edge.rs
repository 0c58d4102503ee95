//! Edge detection: three interchangeable detectors behind one entry point.
//!
//! Every method takes any [`PixelBuffer`] and returns a single-channel
//! edge map of the same size:
//!
//! | Method | Input | Output values |
//! |---|---|---|
//! | [`EdgeMethod::Sobel`] | luminance | continuous `0..=255` |
//! | [`EdgeMethod::Canny`] | luminance | `{0, 255}` |
//! | [`EdgeMethod::Kovalevsky`] | RGB color | `{0, 255}` |

use std::fmt;
use std::str::FromStr;

use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use serde::{Deserialize, Serialize};

use crate::types::{GrayImage, PipelineError, PixelBuffer};

/// Selects which edge detector to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeMethod {
    /// 3x3 Sobel gradient magnitude.
    #[serde(alias = "gradient")]
    Sobel,
    /// Gradient, non-maximum suppression and hysteresis thresholding.
    #[serde(alias = "hysteresis")]
    Canny,
    /// Multi-directional windowed color difference; see [`crate::windowed`].
    #[serde(alias = "windowed")]
    Kovalevsky,
}

impl EdgeMethod {
    /// Every method, in menu order.
    pub const ALL: [Self; 3] = [Self::Sobel, Self::Canny, Self::Kovalevsky];

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sobel => "sobel",
            Self::Canny => "canny",
            Self::Kovalevsky => "kovalevsky",
        }
    }

    const fn alias(self) -> &'static str {
        match self {
            Self::Sobel => "gradient",
            Self::Canny => "hysteresis",
            Self::Kovalevsky => "windowed",
        }
    }
}

impl fmt::Display for EdgeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EdgeMethod {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s) || m.alias().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                PipelineError::invalid(format!(
                    "invalid edge detection method '{s}' (expected sobel, canny or kovalevsky)"
                ))
            })
    }
}

/// Tuning for [`detect_edges`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeParams {
    /// Windowed detector threshold; must be strictly exceeded.
    pub threshold: u8,
    /// Canny Gaussian sigma.
    pub canny_sigma: f32,
    /// Canny low (tracking) threshold.
    pub canny_low: f32,
    /// Canny high (seed) threshold.
    pub canny_high: f32,
}

impl EdgeParams {
    /// Default windowed detector threshold.
    pub const DEFAULT_THRESHOLD: u8 = crate::windowed::DEFAULT_THRESHOLD;
    /// Default Canny sigma.
    pub const DEFAULT_CANNY_SIGMA: f32 = 1.0;
    /// Default Canny low threshold, 10% of the 8-bit range.
    pub const DEFAULT_CANNY_LOW: f32 = 25.5;
    /// Default Canny high threshold, 20% of the 8-bit range.
    pub const DEFAULT_CANNY_HIGH: f32 = 51.0;
}

impl Default for EdgeParams {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            canny_sigma: Self::DEFAULT_CANNY_SIGMA,
            canny_low: Self::DEFAULT_CANNY_LOW,
            canny_high: Self::DEFAULT_CANNY_HIGH,
        }
    }
}

/// Run the selected detector and return a single-channel edge map.
#[must_use = "returns the edge map"]
pub fn detect_edges(image: &PixelBuffer, method: EdgeMethod, params: &EdgeParams) -> GrayImage {
    match method {
        EdgeMethod::Sobel => gradient_magnitude(&crate::tonal::to_gray(image)),
        EdgeMethod::Canny => crate::canny::canny(
            &crate::tonal::to_gray(image),
            params.canny_sigma,
            params.canny_low,
            params.canny_high,
        ),
        EdgeMethod::Kovalevsky => crate::windowed::detect(&image.to_rgb8(), params.threshold),
    }
}

/// Sobel gradient magnitude scaled into `0..=255`.
///
/// Each 3x3 Sobel response is divided by the kernel weight (4), and the
/// magnitude is the root mean square of the two directions, which keeps
/// it within `0..=255`. The result is truncated, not rounded. Borders
/// replicate the edge pixels.
#[must_use = "returns the gradient magnitude map"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn gradient_magnitude(image: &GrayImage) -> GrayImage {
    let gx = horizontal_sobel(image);
    let gy = vertical_sobel(image);
    let magnitude: Vec<u8> = gx
        .pixels()
        .zip(gy.pixels())
        .map(|(h, v)| {
            let (h, v) = (f64::from(h.0[0]) / 4.0, f64::from(v.0[0]) / 4.0);
            let rms = (h.mul_add(h, v * v) / 2.0).sqrt();
            rms.floor().clamp(0.0, 255.0) as u8
        })
        .collect();
    GrayImage::from_raw(image.width(), image.height(), magnitude)
        .unwrap_or_else(|| GrayImage::new(image.width(), image.height()))
}
