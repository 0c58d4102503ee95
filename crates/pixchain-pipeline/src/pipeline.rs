//! The operation pipeline: apply an ordered list of operations to each
//! image.
//!
//! ```rust
//! # use pixchain_pipeline::{OperationSpec, Pipeline, PixelBuffer, Settings};
//! # fn run(image: PixelBuffer) -> Result<(), pixchain_pipeline::PipelineError> {
//! let specs: Vec<OperationSpec> = vec!["flip=horizontal".parse()?, "edge=kovalevsky".parse()?];
//! let pipeline = Pipeline::from_specs(&specs, Settings::default());
//! let processed = pipeline.apply("cat.png", image);
//! assert!(processed.skipped.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! # Error policy
//!
//! An operation that fails, either because its spec did not validate or
//! because it failed on this particular image, is **skipped**: the
//! buffer from the previous step is kept and the remaining operations
//! still run. Every skip is logged and reported in
//! [`Processed::skipped`]. One image failing to load or save never
//! affects the others.
//!
//! # Concurrency
//!
//! Operations are pure functions of their input buffer, the operation
//! and the [`Settings`]; the pipeline holds no per-image state. Distinct
//! images can be processed on different threads, which
//! [`Pipeline::process_batch`] does with `rayon`.

use std::convert::Infallible;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::background::{self, BackgroundRemover};
use crate::edge::{self, EdgeParams};
use crate::geometry::{self, ResampleKernel};
use crate::operation::{Operation, OperationSpec};
use crate::tonal;
use crate::types::{PipelineError, PixelBuffer};

/// Global settings shared by every operation in a run.
///
/// Replaces any process-wide argument namespace: each operation receives
/// these explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Kernel used by every scale operation.
    pub resample: ResampleKernel,

    /// Windowed (kovalevsky) detector threshold. The middle color
    /// difference must strictly exceed it.
    pub threshold: u8,

    /// Gaussian sigma applied before Canny.
    pub canny_sigma: f32,

    /// Canny low (tracking) threshold on the Sobel magnitude scale.
    pub canny_low: f32,

    /// Canny high (seed) threshold on the Sobel magnitude scale.
    pub canny_high: f32,

    /// Border in pixels added around the image before background removal
    /// and trimmed off afterwards.
    pub border: u32,
}

impl Settings {
    /// Default windowed detector threshold.
    pub const DEFAULT_THRESHOLD: u8 = EdgeParams::DEFAULT_THRESHOLD;
    /// Default Canny sigma.
    pub const DEFAULT_CANNY_SIGMA: f32 = EdgeParams::DEFAULT_CANNY_SIGMA;
    /// Default Canny low threshold.
    pub const DEFAULT_CANNY_LOW: f32 = EdgeParams::DEFAULT_CANNY_LOW;
    /// Default Canny high threshold.
    pub const DEFAULT_CANNY_HIGH: f32 = EdgeParams::DEFAULT_CANNY_HIGH;
    /// No border around background removal by default.
    pub const DEFAULT_BORDER: u32 = 0;

    /// The edge-detection subset of the settings.
    #[must_use]
    pub const fn edge_params(&self) -> EdgeParams {
        EdgeParams {
            threshold: self.threshold,
            canny_sigma: self.canny_sigma,
            canny_low: self.canny_low,
            canny_high: self.canny_high,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            resample: ResampleKernel::default(),
            threshold: Self::DEFAULT_THRESHOLD,
            canny_sigma: Self::DEFAULT_CANNY_SIGMA,
            canny_low: Self::DEFAULT_CANNY_LOW,
            canny_high: Self::DEFAULT_CANNY_HIGH,
            border: Self::DEFAULT_BORDER,
        }
    }
}

/// Apply one operation to one image.
///
/// This is the standalone form: errors are returned to the caller rather
/// than skipped.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] when a scale would produce
/// an empty image, and [`PipelineError::Unsupported`] or
/// [`PipelineError::BackgroundRemoval`] for background removal without a
/// working adapter.
pub fn apply_operation(
    image: &PixelBuffer,
    operation: &Operation,
    settings: &Settings,
    remover: Option<&dyn BackgroundRemover>,
) -> Result<PixelBuffer, PipelineError> {
    match *operation {
        Operation::Flip { direction } => Ok(geometry::flip(image, direction)),
        Operation::Scale { mode } => geometry::scale(image, Some(mode), settings.resample),
        Operation::RemoveBackground => {
            background::remove_background(image, remover, settings.border)
        }
        Operation::Invert => Ok(tonal::invert_colors(image)),
        Operation::Grayscale => Ok(tonal::grayscale(image)),
        Operation::EdgeDetection { method } => Ok(PixelBuffer::luma(edge::detect_edges(
            image,
            method,
            &settings.edge_params(),
        ))),
        Operation::Brightness { level } => Ok(tonal::adjust_brightness(image, level)),
        Operation::Contrast { level } => Ok(tonal::adjust_contrast(image, level)),
        Operation::Saturation { level } => Ok(tonal::adjust_saturation(image, level)),
    }
}

/// Apply `operations` in order, skipping any that fail.
///
/// Convenience for callers without a background removal adapter; see
/// [`Pipeline`] for the full form.
#[must_use = "returns the processed image"]
pub fn apply(image: PixelBuffer, operations: &[Operation], settings: &Settings) -> PixelBuffer {
    Pipeline::from_operations(operations.iter().copied(), *settings)
        .apply("image", image)
        .image
}

/// One entry of the operation list.
#[derive(Debug, Clone)]
enum Step {
    Ready(Operation),
    /// Failed validation; skipped for every image.
    Rejected { label: String, error: PipelineError },
}

/// An operation that was skipped for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedOperation {
    /// Position in the operation list.
    pub index: usize,
    /// The operation as written.
    pub operation: String,
    /// Why it was skipped.
    pub reason: PipelineError,
}

/// The result of running the pipeline on one image.
#[derive(Debug, Clone)]
pub struct Processed {
    /// The final buffer.
    pub image: PixelBuffer,
    /// Operations that were skipped, in list order.
    pub skipped: Vec<SkippedOperation>,
}

/// An ordered operation list plus the settings and collaborators needed
/// to run it.
///
/// The list is kept verbatim: no reordering, deduplication or merging.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    steps: Vec<Step>,
    settings: Settings,
    remover: Option<Arc<dyn BackgroundRemover>>,
}

impl Pipeline {
    /// An empty pipeline.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            steps: Vec::new(),
            settings,
            remover: None,
        }
    }

    /// A pipeline over already-validated operations.
    #[must_use]
    pub fn from_operations(operations: impl IntoIterator<Item = Operation>, settings: Settings) -> Self {
        operations
            .into_iter()
            .fold(Self::new(settings), Self::with_operation)
    }

    /// A pipeline over raw specs. Specs that fail validation stay in the
    /// list and are skipped (with a warning) for every image.
    #[must_use]
    pub fn from_specs(specs: &[OperationSpec], settings: Settings) -> Self {
        specs.iter().fold(Self::new(settings), Self::with_spec)
    }

    /// Append a validated operation.
    #[must_use]
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.steps.push(Step::Ready(operation));
        self
    }

    /// Append a raw spec, validating it now.
    #[must_use]
    pub fn with_spec(self, spec: &OperationSpec) -> Self {
        match Operation::parse(spec) {
            Ok(operation) => self.with_operation(operation),
            Err(error) => self.with_rejected(spec.to_string(), error),
        }
    }

    /// Append an entry that is already known to be invalid, e.g. a recipe
    /// entry that failed to deserialize. It is skipped for every image.
    #[must_use]
    pub fn with_rejected(mut self, label: impl Into<String>, error: PipelineError) -> Self {
        self.steps.push(Step::Rejected {
            label: label.into(),
            error,
        });
        self
    }

    /// Use `remover` for [`Operation::RemoveBackground`].
    #[must_use]
    pub fn with_background_remover(mut self, remover: Arc<dyn BackgroundRemover>) -> Self {
        self.remover = Some(remover);
        self
    }

    /// The settings every operation receives.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Number of entries, valid or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// `true` if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The validated operations, in order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.steps.iter().filter_map(|step| match step {
            Step::Ready(op) => Some(op),
            Step::Rejected { .. } => None,
        })
    }

    /// Run every operation in order on one image.
    #[must_use = "returns the processed image"]
    pub fn apply(&self, name: &str, image: PixelBuffer) -> Processed {
        let mut image = image;
        let mut skipped = Vec::new();

        for (index, step) in self.steps.iter().enumerate() {
            let (operation, result) = match step {
                Step::Ready(op) => {
                    log::info!("{}", op.progress_message(name, self.settings.threshold));
                    (op.to_string(), apply_operation(&image, op, &self.settings, self.remover.as_deref()))
                }
                Step::Rejected { label, error } => (label.clone(), Err(error.clone())),
            };

            match result {
                Ok(next) => {
                    log::debug!(
                        "{name}: {operation} -> {}x{} {:?}",
                        next.width(),
                        next.height(),
                        next.color_model()
                    );
                    image = next;
                }
                Err(reason) => {
                    log::warn!("Skipping {operation} for \"{name}\": {reason}");
                    skipped.push(SkippedOperation {
                        index,
                        operation,
                        reason,
                    });
                }
            }
        }

        Processed { image, skipped }
    }

    /// Process in-memory images in parallel. Results keep input order.
    #[must_use = "returns the processed images"]
    pub fn process_batch(&self, images: Vec<(String, PixelBuffer)>) -> Vec<(String, Processed)> {
        images
            .into_par_iter()
            .map(|(name, image)| {
                let processed = self.apply(&name, image);
                (name, processed)
            })
            .collect()
    }

    /// Pull every image from `source`, process it and hand it to `sink`.
    ///
    /// Images are processed one at a time; a caller that wants to stop
    /// early can do so from its source by returning `None`.
    pub fn run<S, K>(&self, source: &mut S, sink: &mut K) -> BatchReport
    where
        S: ImageSource + ?Sized,
        K: ImageSink + ?Sized,
    {
        let mut report = BatchReport::default();

        while let Some(next) = source.next_image() {
            let SourceImage { name, image } = match next {
                Ok(item) => item,
                Err(e) => {
                    log::error!("Failed to load image: {e}");
                    report.failures.push(BatchFailure {
                        name: None,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let processed = self.apply(&name, image);
            report.skipped_operations += processed.skipped.len();

            match sink.save(&name, &processed.image) {
                Ok(()) => report.processed += 1,
                Err(e) => {
                    log::error!("Failed to save \"{name}\": {e}");
                    report.failures.push(BatchFailure {
                        name: Some(name),
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }
}

/// One named image supplied by an [`ImageSource`].
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Display name, usually the file name.
    pub name: String,
    /// Decoded pixels.
    pub image: PixelBuffer,
}

/// Supplies images to [`Pipeline::run`], one at a time.
pub trait ImageSource {
    /// Load failure.
    type Error: std::error::Error;

    /// The next image, or `None` when exhausted.
    fn next_image(&mut self) -> Option<Result<SourceImage, Self::Error>>;
}

/// Receives processed images from [`Pipeline::run`] and persists them.
pub trait ImageSink {
    /// Save failure.
    type Error: std::error::Error;

    /// Persist one image.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the pipeline logs the error, records it
    /// in the [`BatchReport`] and continues with the next image.
    fn save(&mut self, name: &str, image: &PixelBuffer) -> Result<(), Self::Error>;
}

/// An [`ImageSource`] over images already in memory.
#[derive(Debug)]
pub struct MemorySource(std::vec::IntoIter<(String, PixelBuffer)>);

impl MemorySource {
    /// Yield `images` in order.
    #[must_use]
    pub fn new(images: Vec<(String, PixelBuffer)>) -> Self {
        Self(images.into_iter())
    }
}

impl ImageSource for MemorySource {
    type Error = Infallible;

    fn next_image(&mut self) -> Option<Result<SourceImage, Self::Error>> {
        self.0
            .next()
            .map(|(name, image)| Ok(SourceImage { name, image }))
    }
}

/// An [`ImageSink`] that keeps results in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Saved images, in save order.
    pub images: Vec<(String, PixelBuffer)>,
}

impl ImageSink for MemorySink {
    type Error = Infallible;

    fn save(&mut self, name: &str, image: &PixelBuffer) -> Result<(), Self::Error> {
        self.images.push((name.to_owned(), image.clone()));
        Ok(())
    }
}

/// A load or save failure recorded by [`Pipeline::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    /// Image name, when known (load failures happen before a name exists).
    pub name: Option<String>,
    /// The error message.
    pub error: String,
}

/// Summary of a [`Pipeline::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Images processed and saved.
    pub processed: usize,
    /// Total skipped operations across all images.
    pub skipped_operations: usize,
    /// Images that could not be loaded or saved.
    pub failures: Vec<BatchFailure>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::edge::EdgeMethod;
    use crate::geometry::{FlipDirection, ScaleMode};
    use crate::types::{ColorModel, Dimensions, RgbImage};

    fn spec(s: &str) -> OperationSpec {
        s.parse().unwrap()
    }

    fn sample() -> PixelBuffer {
        #[allow(clippy::cast_possible_truncation)]
        let img = RgbImage::from_fn(16, 12, |x, y| image::Rgb([(x * 15) as u8, (y * 20) as u8, 200]));
        PixelBuffer::rgb(img)
    }

    #[test]
    fn empty_pipeline_is_identity() {
        let pipeline = Pipeline::new(Settings::default());
        let out = pipeline.apply("a", sample());
        assert_eq!(out.image, sample());
        assert!(out.skipped.is_empty());
    }

    #[test]
    fn operations_apply_in_order() {
        let pipeline = Pipeline::from_specs(
            &[spec("scale=0.5x"), spec("flip=vertical"), spec("grayscale")],
            Settings::default(),
        );
        let out = pipeline.apply("a", sample());
        assert_eq!(out.image.dimensions(), Dimensions { width: 8, height: 6 });
        assert_eq!(out.image.color_model(), ColorModel::Luma);
    }

    #[test]
    fn invalid_spec_is_skipped_and_rest_continues() {
        let pipeline = Pipeline::from_specs(
            &[spec("scale=huge"), spec("invert"), spec("sharpen"), spec("flip=horizontal")],
            Settings::default(),
        );
        let out = pipeline.apply("a", sample());

        let expected = geometry::flip(&tonal::invert_colors(&sample()), FlipDirection::Horizontal);
        assert_eq!(out.image, expected);
        let indices: Vec<usize> = out.skipped.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert!(matches!(out.skipped[0].reason, PipelineError::InvalidArgument(_)));
        assert!(matches!(out.skipped[1].reason, PipelineError::UnknownOperation(_)));
    }

    #[test]
    fn runtime_failure_keeps_previous_buffer() {
        let pipeline = Pipeline::from_operations(
            [
                Operation::Invert,
                Operation::Scale {
                    mode: ScaleMode::factor(0.01).unwrap(),
                },
                Operation::RemoveBackground,
            ],
            Settings::default(),
        );
        let out = pipeline.apply("a", sample());
        assert_eq!(out.image, tonal::invert_colors(&sample()));
        assert_eq!(out.skipped.len(), 2);
        assert!(matches!(out.skipped[1].reason, PipelineError::Unsupported(_)));
    }

    #[test]
    fn edge_detection_uses_settings_threshold() {
        let img = PixelBuffer::rgb(RgbImage::from_fn(10, 10, |x, _| {
            if x < 5 { image::Rgb([255, 0, 0]) } else { image::Rgb([0, 0, 255]) }
        }));
        let op = [Operation::EdgeDetection {
            method: EdgeMethod::Kovalevsky,
        }];
        let low = apply(img.clone(), &op, &Settings::default());
        assert_eq!(low.as_luma().unwrap().pixels().filter(|p| p.0[0] == 255).count(), 10);

        let strict = Settings {
            threshold: 255,
            ..Settings::default()
        };
        // The boundary difference is 510, still above the largest threshold.
        let high = apply(img, &op, &strict);
        assert_eq!(high.as_luma().unwrap().pixels().filter(|p| p.0[0] == 255).count(), 10);
    }

    #[test]
    fn batch_preserves_order_and_isolates_images() {
        let pipeline = Pipeline::from_specs(&[spec("scale=2x")], Settings::default());
        let images = vec![
            ("tiny".to_owned(), PixelBuffer::rgb(RgbImage::new(1, 1))),
            ("big".to_owned(), sample()),
        ];
        let results = pipeline.process_batch(images);
        assert_eq!(results[0].0, "tiny");
        assert_eq!(results[0].1.image.dimensions(), Dimensions { width: 2, height: 2 });
        assert_eq!(results[1].1.image.dimensions(), Dimensions { width: 32, height: 24 });
    }

    #[test]
    fn run_feeds_sink_and_reports() {
        let pipeline = Pipeline::from_specs(&[spec("grayscale"), spec("brightness=500")], Settings::default());
        let mut source = MemorySource::new(vec![
            ("a.png".to_owned(), sample()),
            ("b.png".to_owned(), sample()),
        ]);
        let mut sink = MemorySink::default();
        let report = pipeline.run(&mut source, &mut sink);

        assert_eq!(report.processed, 2);
        assert_eq!(report.skipped_operations, 2);
        assert!(report.failures.is_empty());
        let names: Vec<&str> = sink.images.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["a.png", "b.png"]);
        assert!(sink.images.iter().all(|(_, img)| img.color_model() == ColorModel::Luma));
    }

    #[test]
    fn operations_lists_only_valid_entries() {
        let pipeline = Pipeline::from_specs(&[spec("invert"), spec("flip=nope")], Settings::default());
        assert_eq!(pipeline.len(), 2);
        assert_eq!(pipeline.operations().count(), 1);
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"resample": "lanczos"}"#).unwrap();
        assert_eq!(settings.resample, ResampleKernel::Lanczos);
        assert_eq!(settings.threshold, 50);
    }
}
