//
// walker.rs
// Image-Tools-rs
//
// Depth-first directory traversal that yields supported image files until cancellation is observed.
//

use std::path::{Path, PathBuf};

use image::ImageFormat;
use tracing::debug;
use walkdir::WalkDir;

use crate::cancel::CancellationToken;

/// Extensions (lower-cased, with the leading dot) that qualify a file for processing.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".bmp"];

/// A file found by the walker whose extension is in the supported set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFileCandidate {
    path: PathBuf,
    extension: String,
}

impl ImageFileCandidate {
    /// Returns `None` when the file name carries no supported extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let extension = file_extension(&path)?;
        SUPPORTED_EXTENSIONS
            .contains(&extension.as_str())
            .then_some(Self { path, extension })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lower-cased extension including the leading dot, e.g. `.jpg`.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Encoding implied by the extension.
    pub fn format(&self) -> Option<ImageFormat> {
        ImageFormat::from_extension(self.extension.trim_start_matches('.'))
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// Everything from the last dot of the file name onward, lower-cased.
fn file_extension(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    name.rfind('.').map(|dot| name[dot..].to_lowercase())
}

/// Lazy iterator over the image files below `root`.
///
/// Subdirectories are only entered when `recursive` is set. Directories that cannot be
/// listed contribute nothing. The token is checked before every entry; once it is set
/// the iterator is exhausted.
pub struct DirectoryWalker {
    entries: walkdir::IntoIter,
    token: CancellationToken,
}

impl DirectoryWalker {
    pub fn new(root: &Path, recursive: bool, token: CancellationToken) -> Self {
        let mut walk = WalkDir::new(root).min_depth(1).follow_links(true);
        if !recursive {
            walk = walk.max_depth(1);
        }
        Self {
            entries: walk.into_iter(),
            token,
        }
    }
}

impl Iterator for DirectoryWalker {
    type Item = ImageFileCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.token.is_cancelled() {
                return None;
            }
            match self.entries.next()? {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    if let Some(candidate) = ImageFileCandidate::from_path(entry.into_path()) {
                        return Some(candidate);
                    }
                }
                Err(e) => {
                    // Unreadable directories and symlink loops are skipped without surfacing.
                    debug!("skipping entry: {e}");
                }
            }
        }
    }
}
