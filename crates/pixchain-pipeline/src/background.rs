//! Background removal through an external segmentation adapter.
//!
//! The segmentation itself is a black box behind [`BackgroundRemover`].
//! This module only frames the call: the image is padded with an
//! optional border before removal and the result is trimmed back to its
//! content afterwards.

use std::fmt;

use image::{GenericImageView, Rgba};

use crate::types::{Dimensions, PipelineError, PixelBuffer, RgbaImage};

/// An adapter that separates foreground from background.
///
/// Implementations receive an RGBA image and return an image of any size
/// whose alpha channel marks the foreground. They must be usable from
/// several threads at once.
pub trait BackgroundRemover: Send + Sync {
    /// Remove the background.
    ///
    /// # Errors
    ///
    /// Implementations should report failures as
    /// [`PipelineError::BackgroundRemoval`].
    fn remove(&self, image: &RgbaImage) -> Result<RgbaImage, PipelineError>;
}

impl fmt::Debug for dyn BackgroundRemover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BackgroundRemover")
    }
}

/// A channel must differ from the top-left pixel by more than this for
/// the pixel to count as content when trimming.
pub const TRIM_TOLERANCE: u8 = 100;

/// Pad, remove the background, trim.
///
/// # Errors
///
/// Returns [`PipelineError::Unsupported`] if `remover` is `None`,
/// [`PipelineError::InvalidArgument`] if `border` makes the padded image
/// too large, or whatever error the adapter reports.
pub fn remove_background(
    image: &PixelBuffer,
    remover: Option<&dyn BackgroundRemover>,
    border: u32,
) -> Result<PixelBuffer, PipelineError> {
    let Some(remover) = remover else {
        return Err(PipelineError::Unsupported(
            "no background removal adapter is configured".to_owned(),
        ));
    };
    let padded = pad(&image.to_rgba8(), border)?;
    let removed = remover.remove(&padded)?;
    Ok(PixelBuffer::rgba(trim(&removed)))
}

/// Surround an image with `border` transparent black pixels on each side.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] if the padded size does not
/// fit in `u32` or exceeds [`Dimensions::MAX_PIXELS`].
pub fn pad(image: &RgbaImage, border: u32) -> Result<RgbaImage, PipelineError> {
    if border == 0 {
        return Ok(image.clone());
    }
    let (w, h) = image.dimensions();
    let grow = |side: u32| border.checked_mul(2).and_then(|b| side.checked_add(b));
    let (Some(width), Some(height)) = (grow(w), grow(h)) else {
        return Err(PipelineError::invalid(format!(
            "border {border} is too large for a {w}x{h} image"
        )));
    };
    Dimensions { width, height }.within_budget()?;

    Ok(RgbaImage::from_fn(width, height, |x, y| {
        match (x.checked_sub(border), y.checked_sub(border)) {
            (Some(sx), Some(sy)) if sx < w && sy < h => *image.get_pixel(sx, sy),
            _ => Rgba([0, 0, 0, 0]),
        }
    }))
}

/// Crop to the bounding box of pixels that differ from the top-left
/// pixel by more than [`TRIM_TOLERANCE`] in any channel.
///
/// Returns the image unchanged when no pixel qualifies.
#[must_use = "returns the trimmed image"]
pub fn trim(image: &RgbaImage) -> RgbaImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return image.clone();
    }
    let background = image.get_pixel(0, 0).0;
    let is_content = |p: &Rgba<u8>| {
        p.0.iter()
            .zip(background)
            .any(|(&c, b)| c.abs_diff(b) > TRIM_TOLERANCE)
    };

    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, p) in image.enumerate_pixels() {
        if is_content(p) {
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
    }

    match bounds {
        Some((x0, y0, x1, y1)) => image.view(x0, y0, x1 - x0 + 1, y1 - y0 + 1).to_image(),
        None => image.clone(),
    }
}
