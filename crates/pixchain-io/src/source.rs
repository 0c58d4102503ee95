//! Image discovery and decoding.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use pixchain_pipeline::{ImageSource, PixelBuffer, SourceImage};
use walkdir::WalkDir;

use crate::IoError;

/// File extensions (lowercase) that are picked up as images.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp", "tif", "tiff"];

/// `true` if `path` has a supported image extension (case-insensitive)
/// and is not a hidden file.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'));
    let supported = path.extension().is_some_and(|ext| {
        let ext = ext.to_string_lossy().to_ascii_lowercase();
        SUPPORTED_EXTENSIONS.contains(&ext.as_str())
    });
    supported && !hidden
}

/// Yields every supported image in a directory, decoded, in file name
/// order.
#[derive(Debug)]
pub struct DirectorySource {
    paths: VecDeque<PathBuf>,
}

impl DirectorySource {
    /// List the supported images directly inside `dir` (not recursive).
    ///
    /// # Errors
    ///
    /// Returns [`IoError::NotADirectory`] if `dir` is not a directory and
    /// [`IoError::Walk`] if it cannot be listed.
    pub fn discover(dir: &Path) -> Result<Self, IoError> {
        Ok(Self::from_paths(list_images(dir)?))
    }

    /// Move every supported image directly inside `dir` into
    /// `dir/subdir` (created if needed), then discover `dir/subdir`.
    ///
    /// Images already in the subdirectory are included.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Io`] if the subdirectory cannot be created or a
    /// file cannot be moved.
    pub fn move_into(dir: &Path, subdir: &str) -> Result<Self, IoError> {
        let target = dir.join(subdir);
        fs::create_dir_all(&target).map_err(|e| IoError::io(&target, e))?;

        for path in list_images(dir)? {
            let Some(file_name) = path.file_name() else {
                continue;
            };
            let dest = target.join(file_name);
            fs::rename(&path, &dest).map_err(|e| IoError::io(&path, e))?;
            log::debug!("Moved {} to {}", path.display(), dest.display());
        }

        Self::discover(&target)
    }

    /// Yield exactly these files, in this order.
    #[must_use]
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            paths: paths.into(),
        }
    }

    /// Queue `other`'s images after this source's.
    pub fn append(&mut self, mut other: Self) {
        self.paths.append(&mut other.paths);
    }

    /// Number of images not yet yielded.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl ImageSource for DirectorySource {
    type Error = IoError;

    fn next_image(&mut self) -> Option<Result<SourceImage, Self::Error>> {
        let path = self.paths.pop_front()?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Some(
            image::open(&path)
                .map(|decoded| {
                    log::debug!("Loaded {name} ({}x{})", decoded.width(), decoded.height());
                    SourceImage {
                        name,
                        image: PixelBuffer::from(decoded),
                    }
                })
                .map_err(|source| IoError::Decode { path, source }),
        )
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, IoError> {
    if !dir.is_dir() {
        return Err(IoError::NotADirectory(dir.to_path_buf()));
    }
    let mut images = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| IoError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && is_supported_image(entry.path()) {
            images.push(entry.into_path());
        }
    }
    Ok(images)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        image::RgbImage::from_pixel(width, height, image::Rgb([10, 20, 30]))
            .save(path)
            .unwrap();
    }

    fn file_names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn extension_check_ignores_case_and_hidden_files() {
        assert!(is_supported_image(Path::new("a/B.JPG")));
        assert!(is_supported_image(Path::new("scan.tiff")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new(".cat.tmp.png")));
        assert!(!is_supported_image(Path::new("no_extension")));
    }

    #[test]
    fn lists_images_sorted_and_flat() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("b.png"), 2, 2);
        write_png(&dir.path().join("a.png"), 2, 2);
        fs::write(dir.path().join("C.JPEG"), b"not really").unwrap();
        fs::write(dir.path().join("readme.md"), b"#").unwrap();
        fs::create_dir(dir.path().join("nested.png")).unwrap();
        write_png(&dir.path().join("nested.png").join("deep.png"), 2, 2);

        let images = list_images(dir.path()).unwrap();
        assert_eq!(file_names(&images), ["C.JPEG", "a.png", "b.png"]);
    }

    #[test]
    fn file_is_not_a_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("x.png");
        write_png(&file, 1, 1);
        assert!(matches!(DirectorySource::discover(&file), Err(IoError::NotADirectory(_))));
    }

    #[test]
    fn decodes_images_and_reports_bad_files() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("good.png"), 3, 2);
        fs::write(dir.path().join("hmm.png"), b"garbage").unwrap();

        let mut source = DirectorySource::discover(dir.path()).unwrap();
        assert_eq!(source.remaining(), 2);

        let first = source.next_image().unwrap().unwrap();
        assert_eq!(first.name, "good.png");
        assert_eq!((first.image.width(), first.image.height()), (3, 2));

        assert!(matches!(source.next_image(), Some(Err(IoError::Decode { .. }))));
        assert!(source.next_image().is_none());
    }

    #[test]
    fn move_into_relocates_images() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("one.png"), 1, 1);
        write_png(&dir.path().join("two.png"), 1, 1);
        fs::write(dir.path().join("keep.txt"), b"stay").unwrap();
        fs::create_dir(dir.path().join("Images")).unwrap();
        write_png(&dir.path().join("Images").join("zero.png"), 1, 1);

        let source = DirectorySource::move_into(dir.path(), "Images").unwrap();

        assert_eq!(source.remaining(), 3);
        assert!(!dir.path().join("one.png").exists());
        assert!(dir.path().join("Images").join("two.png").exists());
        assert!(dir.path().join("keep.txt").exists());
    }

    #[test]
    fn appended_sources_yield_in_sequence() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("x.png"), 1, 1);
        write_png(&dir.path().join("y.png"), 1, 1);

        let mut source = DirectorySource::from_paths(vec![dir.path().join("y.png")]);
        source.append(DirectorySource::from_paths(vec![dir.path().join("x.png")]));

        let names: Vec<String> = std::iter::from_fn(|| source.next_image())
            .map(|item| item.unwrap().name)
            .collect();
        assert_eq!(names, ["y.png", "x.png"]);
    }
}
