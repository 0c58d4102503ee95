//! Windowed-difference edge detection in color (Kovalevsky-style).
//!
//! A 6-pixel window slides along every row and every column. The five
//! differences between neighbouring pixels inside the window are the sum
//! of absolute per-channel differences. The pixel after the middle
//! difference (offset 3 in the window) is marked as an edge when the
//! middle difference exceeds the threshold and is strictly greater than
//! each of the other four differences.
//!
//! Consecutive windows share four of their five differences, so each scan
//! line's differences are computed once and the window is a slice of
//! five of them.
//!
//! The horizontal and vertical scans write into the same map; a pixel
//! marked by both is still just 255.

use image::Luma;

use crate::types::{GrayImage, RgbImage};

/// Number of pixels in the sliding window.
pub const WINDOW: u32 = 6;

/// Offset of the marked pixel from the window start.
pub const EDGE_OFFSET: u32 = 3;

/// Default for [`detect`]'s `threshold`.
pub const DEFAULT_THRESHOLD: u8 = 50;

const EDGE: Luma<u8> = Luma([255]);

/// Run both scans and return a binary (0/255) edge map.
///
/// An image narrower than [`WINDOW`] skips the horizontal scan and one
/// shorter than [`WINDOW`] skips the vertical scan, so an image small on
/// both axes yields an all-zero map of the same size.
///
/// `threshold` must be strictly exceeded by the middle difference.
#[must_use = "returns the binary edge map"]
pub fn detect(image: &RgbImage, threshold: u8) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut edges = GrayImage::new(width, height);
    let threshold = u32::from(threshold);

    if width >= WINDOW {
        let mut diffs = Vec::with_capacity(width as usize - 1);
        for y in 0..height {
            diffs.clear();
            diffs.extend((0..width - 1).map(|x| {
                color_distance(image.get_pixel(x, y).0, image.get_pixel(x + 1, y).0)
            }));
            for x in window_peaks(&diffs, threshold) {
                edges.put_pixel(x + EDGE_OFFSET, y, EDGE);
            }
        }
    }

    if height >= WINDOW {
        let mut diffs = Vec::with_capacity(height as usize - 1);
        for x in 0..width {
            diffs.clear();
            diffs.extend((0..height - 1).map(|y| {
                color_distance(image.get_pixel(x, y).0, image.get_pixel(x, y + 1).0)
            }));
            for y in window_peaks(&diffs, threshold) {
                edges.put_pixel(x, y + EDGE_OFFSET, EDGE);
            }
        }
    }

    edges
}

/// Sum of absolute per-channel differences between two pixels (0..=765).
fn color_distance(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b)
        .map(|(&p, q)| u32::from(p.abs_diff(q)))
        .sum()
}

/// Window start positions whose middle difference is a strict peak.
///
/// `diffs[i]` is the difference between pixels `i` and `i + 1` of one scan
/// line, so a window starting at pixel `s` covers `diffs[s..s + 5]`.
fn window_peaks(diffs: &[u32], threshold: u32) -> impl Iterator<Item = u32> + '_ {
    diffs
        .windows(WINDOW as usize - 1)
        .enumerate()
        .filter(move |(_, d)| is_strict_peak(d, threshold))
        .filter_map(|(start, _)| u32::try_from(start).ok())
}

/// `d[2] > threshold` and `d[2] > d[i]` for every other `i`.
fn is_strict_peak(d: &[u32], threshold: u32) -> bool {
    let center = d[2];
    center > threshold
        && d.iter()
            .enumerate()
            .all(|(i, &other)| i == 2 || center > other)
}
