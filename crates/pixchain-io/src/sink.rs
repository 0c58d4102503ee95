//! PNG output directory.

use std::fs;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use pixchain_pipeline::{ImageSink, PixelBuffer};

use crate::IoError;

/// Writes each image as `<stem>.png` into one directory.
///
/// The file is written under a hidden temporary name first and then
/// renamed, so a partially written output never carries the final name.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Use `dir`, creating it (and its parents) if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Io`] if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, IoError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| IoError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// The output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the image called `name` is written: the name's stem plus
    /// `.png`.
    #[must_use]
    pub fn output_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.png", stem(name)))
    }
}

impl ImageSink for DirectorySink {
    type Error = IoError;

    fn save(&mut self, name: &str, image: &PixelBuffer) -> Result<(), Self::Error> {
        let stem = stem(name);
        let tmp = self.dir.join(format!(".{stem}.tmp.png"));
        let path = self.output_path(name);

        if let Err(source) = image.as_dynamic().save_with_format(&tmp, ImageFormat::Png) {
            let _ = fs::remove_file(&tmp);
            return Err(IoError::Encode { path, source });
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(IoError::io(&path, e));
        }

        log::info!("Image saved successfully: {}", path.display());
        Ok(())
    }
}

fn stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map_or_else(|| name.to_owned(), |s| s.to_string_lossy().into_owned())
}
