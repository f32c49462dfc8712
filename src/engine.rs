//
// engine.rs
// Image-Tools-rs
//
// Per-file dispatch of the selected operation: scale, negate, delete, or copy.
//

use std::fs;
use std::io;
use std::path::Path;

use image::ImageFormat;
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::config::BatchConfig;
use crate::error::ProcessError;
use crate::image::{open, save_in_place, scale};
use crate::models::FileOutcome;
use crate::negate::negate;
use crate::operation::OperationRequest;
use crate::pixels::PixelBuffer;
use crate::walker::ImageFileCandidate;

/// Applies one operation to one file at a time. Cheap to clone; holds no per-file state.
#[derive(Debug, Clone)]
pub struct ImageTransformEngine {
    operation: OperationRequest,
    parallel_threshold: u64,
    image_workers: usize,
    token: CancellationToken,
}

impl ImageTransformEngine {
    pub fn new(
        operation: OperationRequest,
        config: &BatchConfig,
        token: CancellationToken,
    ) -> Self {
        Self {
            operation,
            parallel_threshold: config.parallel_threshold,
            image_workers: config.negate_workers(),
            token,
        }
    }

    pub fn operation(&self) -> &OperationRequest {
        &self.operation
    }

    /// Run the operation on `candidate`. A job that starts after cancellation does nothing.
    pub fn process(&self, candidate: &ImageFileCandidate) -> Result<FileOutcome, ProcessError> {
        if self.token.is_cancelled() {
            return Ok(FileOutcome::Skipped);
        }

        let path = candidate.path();
        let outcome = match &self.operation {
            OperationRequest::Scale { factor } => {
                scale_file(path, output_format(candidate)?, *factor)?
            }
            OperationRequest::Negate => self.negate_file(path, output_format(candidate)?)?,
            OperationRequest::Delete => delete_file(path)?,
            OperationRequest::Copy { target_dir } => copy_file(path, target_dir)?,
        };
        debug!("{}: {:?}", path.display(), outcome);
        Ok(outcome)
    }

    fn negate_file(&self, path: &Path, format: ImageFormat) -> Result<FileOutcome, ProcessError> {
        let decoded = open(path)?;
        // Decoding can take a while; do not start pixel work once cancellation is set.
        if self.token.is_cancelled() {
            return Ok(FileOutcome::Skipped);
        }

        let transform_error = |source| ProcessError::Transform {
            path: path.to_path_buf(),
            source,
        };
        let source = PixelBuffer::from_dynamic(&decoded);
        drop(decoded);
        let negated = negate(&source, self.parallel_threshold, self.image_workers)
            .map_err(transform_error)?
            .into_dynamic()
            .map_err(transform_error)?;

        save_in_place(path, &negated, format)?;
        Ok(FileOutcome::Processed)
    }
}

fn output_format(candidate: &ImageFileCandidate) -> Result<ImageFormat, ProcessError> {
    candidate
        .format()
        .ok_or_else(|| ProcessError::UnsupportedFormat {
            extension: candidate.extension().to_string(),
        })
}

fn scale_file(path: &Path, format: ImageFormat, factor: f64) -> Result<FileOutcome, ProcessError> {
    let decoded = open(path)?;
    let scaled = scale(&decoded, factor)?;
    drop(decoded);
    save_in_place(path, &scaled, format)?;
    Ok(FileOutcome::Processed)
}

fn delete_file(path: &Path) -> Result<FileOutcome, ProcessError> {
    fs::remove_file(path).map_err(|source| ProcessError::Delete {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(FileOutcome::Processed)
}

/// Copy into `target_dir` under the same base name, replacing any existing file there.
fn copy_file(path: &Path, target_dir: &Path) -> Result<FileOutcome, ProcessError> {
    let copy_error = |source| ProcessError::Copy {
        path: path.to_path_buf(),
        target: target_dir.to_path_buf(),
        source,
    };
    let name = path.file_name().ok_or_else(|| {
        copy_error(io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))
    })?;
    let destination = target_dir.join(name);
    // Copying a file onto itself would truncate it before reading.
    if is_same_file(path, &destination) {
        debug!("{} is already in {}", path.display(), target_dir.display());
        return Ok(FileOutcome::Processed);
    }
    fs::copy(path, destination).map_err(copy_error)?;
    Ok(FileOutcome::Processed)
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use tempfile::tempdir;

    fn engine(operation: OperationRequest) -> ImageTransformEngine {
        ImageTransformEngine::new(operation, &BatchConfig::default(), CancellationToken::new())
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 100]));
        img.save(path).expect("write png");
    }

    #[test]
    fn cancelled_job_leaves_file_alone() {
        let dir = tempdir().expect("tmpdir");
        let path = dir.path().join("keep.png");
        write_png(&path, 2, 2);

        let token = CancellationToken::new();
        token.cancel();
        let engine = ImageTransformEngine::new(OperationRequest::Delete, &BatchConfig::default(), token);
        let candidate = ImageFileCandidate::from_path(&path).unwrap();
        assert_eq!(engine.process(&candidate).unwrap(), FileOutcome::Skipped);
        assert!(path.exists());
    }

    #[test]
    fn negate_overwrites_in_place() {
        let dir = tempdir().expect("tmpdir");
        let path = dir.path().join("pic.png");
        write_png(&path, 3, 2);

        let candidate = ImageFileCandidate::from_path(&path).unwrap();
        engine(OperationRequest::Negate).process(&candidate).unwrap();

        let negated = image::open(&path).unwrap().to_rgb8();
        assert_eq!(negated.get_pixel(2, 1), &Rgb([253, 254, 155]));
    }

    #[test]
    fn negate_uses_parallel_path_above_threshold() {
        let dir = tempdir().expect("tmpdir");
        let path = dir.path().join("big.png");
        write_png(&path, 16, 9);

        let config = BatchConfig {
            parallel_threshold: 100,
            image_workers: 4,
            ..BatchConfig::default()
        };
        let engine = ImageTransformEngine::new(OperationRequest::Negate, &config, CancellationToken::new());
        let candidate = ImageFileCandidate::from_path(&path).unwrap();
        engine.process(&candidate).unwrap();

        let negated = image::open(&path).unwrap().to_rgb8();
        assert_eq!(negated.get_pixel(15, 8), &Rgb([240, 247, 155]));
    }

    #[test]
    fn scale_writes_floored_dimensions() {
        let dir = tempdir().expect("tmpdir");
        let path = dir.path().join("pic.bmp");
        DynamicImage::ImageRgb8(RgbImage::new(5, 3)).save(&path).unwrap();

        let candidate = ImageFileCandidate::from_path(&path).unwrap();
        engine(OperationRequest::scale(1.5).unwrap()).process(&candidate).unwrap();

        let scaled = image::open(&path).unwrap();
        assert_eq!((scaled.width(), scaled.height()), (7, 4));
    }

    #[test]
    fn copy_replaces_existing_target() {
        let dir = tempdir().expect("tmpdir");
        let target = dir.path().join("out");
        fs::create_dir(&target).unwrap();
        let path = dir.path().join("pic.png");
        write_png(&path, 2, 2);
        fs::write(target.join("pic.png"), b"stale").unwrap();

        let candidate = ImageFileCandidate::from_path(&path).unwrap();
        engine(OperationRequest::Copy {
            target_dir: target.clone(),
        })
        .process(&candidate)
        .unwrap();

        assert_eq!(fs::read(target.join("pic.png")).unwrap(), fs::read(&path).unwrap());
    }

    #[test]
    fn copy_into_own_directory_keeps_the_file() {
        let dir = tempdir().expect("tmpdir");
        let path = dir.path().join("pic.png");
        write_png(&path, 4, 4);
        let before = fs::read(&path).unwrap();

        let candidate = ImageFileCandidate::from_path(&path).unwrap();
        let outcome = engine(OperationRequest::Copy {
            target_dir: dir.path().to_path_buf(),
        })
        .process(&candidate)
        .unwrap();

        assert_eq!(outcome, FileOutcome::Processed);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn deleting_a_missing_file_is_reported() {
        let dir = tempdir().expect("tmpdir");
        let candidate = ImageFileCandidate::from_path(dir.path().join("ghost.jpg")).unwrap();
        let err = engine(OperationRequest::Delete).process(&candidate).unwrap_err();
        assert!(matches!(err, ProcessError::Delete { .. }));
    }

    #[test]
    fn corrupt_image_fails_without_touching_it() {
        let dir = tempdir().expect("tmpdir");
        let path = dir.path().join("broken.jpg");
        fs::write(&path, b"garbage").unwrap();

        let candidate = ImageFileCandidate::from_path(&path).unwrap();
        let err = engine(OperationRequest::Negate).process(&candidate).unwrap_err();
        assert!(matches!(err, ProcessError::Decode { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"garbage");
    }
}
