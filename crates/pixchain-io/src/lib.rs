//! pixchain-io: filesystem glue for the pixchain pipeline.
//!
//! [`DirectorySource`] discovers and decodes images in a directory;
//! [`DirectorySink`] encodes results as PNG into an output directory.
//! Both plug into [`pixchain_pipeline::Pipeline::run`].

use std::path::PathBuf;

pub mod sink;
pub mod source;

pub use sink::DirectorySink;
pub use source::{DirectorySource, SUPPORTED_EXTENSIONS, is_supported_image};

/// Errors from reading or writing image files.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// A filesystem operation failed.
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Listing a directory failed.
    #[error("failed to list {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// A file could not be decoded as an image.
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    /// An image could not be encoded.
    #[error("failed to encode {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },

    /// The input path exists but is not a directory.
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
}

impl IoError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
