//
// error.rs
// Image-Tools-rs
//
// Typed failures for the library layer: per-file processing, pixel transforms, pool setup, and operation parameters.
//

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::pixels::ChannelLayout;

/// Failure of one file's job. Never crosses a job boundary.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to delete {}: {source}", path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to copy {} into {}: {source}", path.display(), target.display())]
    Copy {
        path: PathBuf,
        target: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no encoder for extension {extension:?}")]
    UnsupportedFormat { extension: String },
    #[error("scaling {width}x{height} by {factor} does not give a drawable image")]
    InvalidScale { width: u32, height: u32, factor: f64 },
    #[error("negate failed for {}: {source}", path.display())]
    Transform {
        path: PathBuf,
        #[source]
        source: TransformError,
    },
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("failed to build image worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("rows {start}..{end} do not line up with the target buffer")]
    ChunkMismatch { start: u32, end: u32 },
    #[error("{len} bytes cannot hold a {width}x{height} {layout:?} image")]
    BufferSize {
        width: u32,
        height: u32,
        layout: ChannelLayout,
        len: usize,
    },
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to build batch worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Error, PartialEq)]
pub enum OperationError {
    #[error("scale factor must be a positive number, got {0}")]
    InvalidScaleFactor(f64),
    #[error("scale factor {0:?} is not a number")]
    UnparsableScaleFactor(String),
}
