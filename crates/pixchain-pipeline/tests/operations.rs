//! Integration test: behaviour of operation chains through the public API.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use pixchain_pipeline::{
    ColorModel, Dimensions, EdgeMethod, FlipDirection, Level, MemorySink, MemorySource, Operation,
    OperationSpec, Pipeline, PipelineError, PixelBuffer, ScaleMode, Settings, apply,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[allow(clippy::cast_possible_truncation)]
fn gradient(width: u32, height: u32) -> PixelBuffer {
    PixelBuffer::rgb(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 90])
    }))
}

fn red_blue_split() -> PixelBuffer {
    PixelBuffer::rgb(RgbImage::from_fn(10, 10, |x, _| {
        if x < 5 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) }
    }))
}

fn specs(list: &[&str]) -> Vec<OperationSpec> {
    list.iter().map(|s| s.parse().unwrap()).collect()
}

fn level(l: i64) -> Level {
    Level::new(l).unwrap()
}

#[test]
fn flipping_twice_restores_the_image() {
    let img = gradient(13, 7);
    for direction in FlipDirection::ALL {
        let op = Operation::Flip { direction };
        let out = apply(img.clone(), &[op, op], &Settings::default());
        assert_eq!(out, img, "{direction}");
    }
}

#[test]
fn scale_up_then_down_restores_dimensions() {
    let img = gradient(31, 17);
    let ops = [
        Operation::Scale {
            mode: ScaleMode::factor(2.0).unwrap(),
        },
        Operation::Scale {
            mode: ScaleMode::factor(0.5).unwrap(),
        },
    ];
    let out = apply(img, &ops, &Settings::default());
    assert_eq!(out.dimensions(), Dimensions { width: 31, height: 17 });
    assert_eq!(out.color_model(), ColorModel::Rgb);
}

#[test]
fn fit_within_preserves_aspect_ratio() {
    let img = gradient(200, 100);
    let out = apply(
        img,
        &[Operation::Scale {
            mode: ScaleMode::fit_within(80, 60).unwrap(),
        }],
        &Settings::default(),
    );
    assert_eq!(out.dimensions(), Dimensions { width: 80, height: 40 });
}

#[test]
fn zero_levels_and_double_inversion_are_identities() {
    let img = PixelBuffer::rgba(RgbaImage::from_fn(9, 9, |x, y| {
        #[allow(clippy::cast_possible_truncation)]
        let v = (x * 28 + y) as u8;
        Rgba([v, 255 - v, v / 2, 200])
    }));
    let ops = [
        Operation::Brightness { level: level(0) },
        Operation::Contrast { level: level(0) },
        Operation::Saturation { level: level(0) },
        Operation::Invert,
        Operation::Invert,
    ];
    assert_eq!(apply(img.clone(), &ops, &Settings::default()), img);
}

#[test]
fn windowed_detector_marks_the_color_boundary() {
    let out = apply(
        red_blue_split(),
        &[Operation::EdgeDetection {
            method: EdgeMethod::Kovalevsky,
        }],
        &Settings::default(),
    );
    let edges = out.as_luma().unwrap();
    for (x, _, p) in edges.enumerate_pixels() {
        let expected = if x == 5 { 255 } else { 0 };
        assert_eq!(p.0[0], expected);
    }
}

#[test]
fn windowed_boundary_survives_a_high_threshold() {
    let settings = Settings {
        threshold: 100,
        ..Settings::default()
    };
    let out = apply(
        red_blue_split(),
        &[Operation::EdgeDetection {
            method: EdgeMethod::Kovalevsky,
        }],
        &settings,
    );
    let marked: Vec<(u32, u32)> = out
        .as_luma()
        .unwrap()
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] == 255)
        .map(|(x, y, _)| (x, y))
        .collect();
    assert_eq!(marked.len(), 10);
    assert!(marked.iter().all(|&(x, _)| x == 5));
}

#[test]
fn invert_and_grayscale_do_not_commute() {
    // 114 * 250 = 28500 sits exactly on a rounding half.
    let img = PixelBuffer::rgb(RgbImage::from_pixel(3, 3, Rgb([0, 0, 250])));

    let gray_first = apply(img.clone(), &[Operation::Grayscale, Operation::Invert], &Settings::default());
    let invert_first = apply(img, &[Operation::Invert, Operation::Grayscale], &Settings::default());

    assert_eq!(gray_first.as_luma().unwrap().get_pixel(0, 0).0[0], 226);
    assert_eq!(invert_first.as_luma().unwrap().get_pixel(0, 0).0[0], 227);
    assert_ne!(gray_first, invert_first);
}

#[test]
fn windowed_detector_on_tiny_image_is_blank() {
    let img = PixelBuffer::rgb(RgbImage::from_fn(5, 5, |x, _| {
        if x < 2 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
    }));
    let out = apply(
        img,
        &[Operation::EdgeDetection {
            method: EdgeMethod::Kovalevsky,
        }],
        &Settings::default(),
    );
    assert_eq!(out.dimensions(), Dimensions { width: 5, height: 5 });
    assert!(out.as_luma().unwrap().pixels().all(|p| p.0[0] == 0));
}

#[test]
fn canny_output_is_binary() {
    let out = apply(
        gradient(40, 30),
        &[Operation::EdgeDetection {
            method: EdgeMethod::Canny,
        }],
        &Settings::default(),
    );
    assert!(out.as_luma().unwrap().pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
}

#[test]
fn identical_inputs_give_identical_outputs() {
    init_logging();
    let pipeline = Pipeline::from_specs(
        &specs(&["scale=1.3x", "saturation=40", "edge=sobel"]),
        Settings::default(),
    );
    let a = pipeline.apply("a", gradient(25, 25));
    let b = pipeline.apply("b", gradient(25, 25));
    assert_eq!(a.image, b.image);
}

#[test]
fn operation_order_matters() {
    let img = PixelBuffer::rgb(RgbImage::from_pixel(4, 4, Rgb([100, 100, 100])));
    let brighten = Operation::Brightness { level: level(50) };
    let stretch = Operation::Contrast { level: level(100) };

    let first = apply(img.clone(), &[brighten, stretch], &Settings::default());
    let second = apply(img, &[stretch, brighten], &Settings::default());

    // 100 * 1.5 = 150, (150 - 128) * 2 + 128 = 172
    assert_eq!(first.to_rgb8().get_pixel(0, 0).0, [172, 172, 172]);
    // (100 - 128) * 2 + 128 = 72, 72 * 1.5 = 108
    assert_eq!(second.to_rgb8().get_pixel(0, 0).0, [108, 108, 108]);
}

#[test]
fn invalid_operations_are_skipped() {
    init_logging();
    let pipeline = Pipeline::from_specs(
        &specs(&["flip=diagonal", "contrast=250", "grayscale", "blur=3"]),
        Settings::default(),
    );
    let out = pipeline.apply("photo.jpg", red_blue_split());
    assert_eq!(out.image.color_model(), ColorModel::Luma);
    assert_eq!(out.skipped.len(), 3);
    assert!(matches!(out.skipped[2].reason, PipelineError::UnknownOperation(_)));
}

#[test]
fn run_processes_every_image() {
    init_logging();
    let pipeline = Pipeline::from_specs(&specs(&["flip=both", "invert"]), Settings::default());
    let mut source = MemorySource::new(vec![
        ("one.png".to_owned(), gradient(8, 8)),
        ("two.png".to_owned(), red_blue_split()),
        ("three.png".to_owned(), gradient(3, 11)),
    ]);
    let mut sink = MemorySink::default();

    let report = pipeline.run(&mut source, &mut sink);

    assert_eq!(report.processed, 3);
    assert_eq!(report.skipped_operations, 0);
    assert_eq!(sink.images.len(), 3);
    assert_eq!(sink.images[2].1.dimensions(), Dimensions { width: 3, height: 11 });
}

#[test]
fn oversized_scale_is_skipped_for_every_image() {
    init_logging();
    let settings = Settings {
        resample: pixchain_pipeline::ResampleKernel::Nearest,
        ..Settings::default()
    };
    let pipeline = Pipeline::from_specs(&specs(&["scale=1e12x", "invert"]), settings);
    let mut source = MemorySource::new(vec![
        ("a.png".to_owned(), gradient(10, 10)),
        ("b.png".to_owned(), gradient(4, 4)),
    ]);
    let mut sink = MemorySink::default();

    let report = pipeline.run(&mut source, &mut sink);

    assert_eq!(report.processed, 2);
    assert_eq!(report.skipped_operations, 2);
    assert_eq!(sink.images[0].1.dimensions(), Dimensions { width: 10, height: 10 });
    assert_eq!(sink.images[1].1.to_rgb8().get_pixel(0, 0).0, [255, 255, 165]);
}
