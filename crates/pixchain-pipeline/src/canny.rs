//! Hysteresis-threshold (Canny) edge detection.
//!
//! Gaussian smoothing, Sobel gradients, non-maximum suppression along
//! the quantised gradient direction, then double thresholding: pixels at
//! or above `high` seed edges, and edges grow through 8-connected
//! neighbours at or above `low`.
//!
//! `imageproc::edges::canny` 0.26 can panic when hysteresis reaches the
//! image border (<https://github.com/image-rs/imageproc/issues/705>) and
//! only follows 6 of the 8 neighbours, so the thinning and hysteresis
//! steps are implemented here on flat buffers with bounds-checked
//! neighbour lookups. Blur and gradients still come from `imageproc`.

use imageproc::filter::gaussian_blur_f32;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use crate::types::GrayImage;

/// Minimum allowed threshold.
///
/// A low threshold of zero turns every pixel with any gradient into a
/// candidate, flooding the map.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Detect edges and return a strictly binary (0/255) map.
///
/// `sigma <= 0` skips the blur. Both thresholds are clamped to at least
/// [`MIN_THRESHOLD`] and `low` is clamped to at most `high`. Thresholds
/// are on the unnormalised Sobel magnitude scale of an 8-bit image.
///
/// Images smaller than 3x3 have no interior and yield an empty map.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, sigma: f32, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let high = high_threshold.max(MIN_THRESHOLD);
    let low = low_threshold.max(MIN_THRESHOLD).min(high);

    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        return GrayImage::new(width, height);
    }

    let blurred = if sigma > 0.0 {
        gaussian_blur_f32(image, sigma)
    } else {
        image.clone()
    };

    let gx = horizontal_sobel(&blurred);
    let gy = vertical_sobel(&blurred);
    let gradients: Vec<(f32, f32)> = gx
        .pixels()
        .zip(gy.pixels())
        .map(|(h, v)| (f32::from(h.0[0]), f32::from(v.0[0])))
        .collect();

    let grid = Grid {
        width: width as usize,
        height: height as usize,
    };
    let thinned = non_maximum_suppression(&grid, &gradients);
    let edges = hysteresis(&grid, &thinned, low, high);

    GrayImage::from_raw(width, height, edges).unwrap_or_else(|| GrayImage::new(width, height))
}

/// Row-major layout of a flat per-pixel buffer.
struct Grid {
    width: usize,
    height: usize,
}

impl Grid {
    const fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// In-bounds 8-connected neighbours of `(x, y)`.
    fn neighbours(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        const OFFSETS: [(isize, isize); 8] = [
            (-1, -1),
            (0, -1),
            (1, -1),
            (-1, 0),
            (1, 0),
            (-1, 1),
            (0, 1),
            (1, 1),
        ];
        OFFSETS.iter().filter_map(move |&(dx, dy)| {
            let nx = x.checked_add_signed(dx)?;
            let ny = y.checked_add_signed(dy)?;
            (nx < self.width && ny < self.height).then_some((nx, ny))
        })
    }
}

/// Keep only pixels whose magnitude is a maximum across the edge.
///
/// The gradient angle is folded into `[0, 180)` and quantised to 0, 45,
/// 90 or 135 degrees; the pixel survives if neither neighbour along that
/// direction is stronger. Border pixels are always suppressed.
fn non_maximum_suppression(grid: &Grid, gradients: &[(f32, f32)]) -> Vec<f32> {
    let magnitude: Vec<f32> = gradients.iter().map(|&(gx, gy)| gx.hypot(gy)).collect();
    let mut out = vec![0.0; magnitude.len()];

    for y in 1..grid.height - 1 {
        for x in 1..grid.width - 1 {
            let i = grid.index(x, y);
            let (gx, gy) = gradients[i];
            let mut angle = gy.atan2(gx).to_degrees();
            if angle < 0.0 {
                angle += 180.0;
            }

            let (a, b) = if !(22.5..157.5).contains(&angle) {
                (grid.index(x - 1, y), grid.index(x + 1, y))
            } else if angle < 67.5 {
                (grid.index(x + 1, y + 1), grid.index(x - 1, y - 1))
            } else if angle < 112.5 {
                (grid.index(x, y - 1), grid.index(x, y + 1))
            } else {
                (grid.index(x - 1, y + 1), grid.index(x + 1, y - 1))
            };

            let m = magnitude[i];
            if m >= magnitude[a] && m >= magnitude[b] {
                out[i] = m;
            }
        }
    }
    out
}

/// Double thresholding with depth-first edge tracking.
fn hysteresis(grid: &Grid, thinned: &[f32], low: f32, high: f32) -> Vec<u8> {
    let mut out = vec![0u8; thinned.len()];
    let mut stack = Vec::new();

    for y in 0..grid.height {
        for x in 0..grid.width {
            let i = grid.index(x, y);
            if thinned[i] < high || out[i] != 0 {
                continue;
            }
            out[i] = 255;
            stack.push((x, y));
            while let Some((cx, cy)) = stack.pop() {
                for (nx, ny) in grid.neighbours(cx, cy) {
                    let n = grid.index(nx, ny);
                    if thinned[n] >= low && out[n] == 0 {
                        out[n] = 255;
                        stack.push((nx, ny));
                    }
                }
            }
        }
    }
    out
}
