//! pixchain-pipeline: Pure pixel operation pipeline (sans-IO).
//!
//! Applies an ordered, user-chosen list of operations to in-memory
//! images: flip, scale, background removal, invert, grayscale,
//! brightness / contrast / saturation and edge detection (Sobel, Canny
//! or the windowed color-difference detector).
//!
//! This crate has **no I/O dependencies**. Loading and saving images
//! goes through the [`ImageSource`] and [`ImageSink`] traits, which the
//! `pixchain-io` crate implements for the filesystem.

pub mod background;
pub mod canny;
pub mod edge;
pub mod geometry;
pub mod operation;
pub mod pipeline;
pub mod tonal;
pub mod types;
pub mod windowed;

pub use background::BackgroundRemover;
pub use edge::{EdgeMethod, EdgeParams, detect_edges};
pub use geometry::{FlipDirection, ResampleKernel, ScaleMode};
pub use operation::{Operation, OperationSpec};
pub use pipeline::{
    BatchFailure, BatchReport, ImageSink, ImageSource, MemorySink, MemorySource, Pipeline,
    Processed, Settings, SkippedOperation, SourceImage, apply, apply_operation,
};
pub use tonal::Level;
pub use types::{ColorModel, Dimensions, PipelineError, PixelBuffer};
