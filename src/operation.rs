//
// operation.rs
// Image-Tools-rs
//
// The closed set of batch operations; one handler per variant lives in the engine.
//

use std::fmt;
use std::path::PathBuf;

use crate::error::OperationError;

/// What to do with every image found. Built once before traversal and shared read-only by all jobs.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationRequest {
    /// Stretch by `factor` using bilinear interpolation, overwriting the file.
    Scale { factor: f64 },
    /// Complement the colour channels, overwriting the file.
    Negate,
    /// Remove the file.
    Delete,
    /// Copy the file into `target_dir` under its own name.
    Copy { target_dir: PathBuf },
}

impl OperationRequest {
    pub fn scale(factor: f64) -> Result<Self, OperationError> {
        validate_scale_factor(factor).map(|factor| OperationRequest::Scale { factor })
    }

    pub fn name(&self) -> &'static str {
        match self {
            OperationRequest::Scale { .. } => "scale",
            OperationRequest::Negate => "negate",
            OperationRequest::Delete => "delete",
            OperationRequest::Copy { .. } => "copy",
        }
    }
}

impl fmt::Display for OperationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationRequest::Scale { factor } => write!(f, "scale x{factor}"),
            OperationRequest::Copy { target_dir } => write!(f, "copy -> {}", target_dir.display()),
            other => f.write_str(other.name()),
        }
    }
}

pub fn validate_scale_factor(factor: f64) -> Result<f64, OperationError> {
    if factor.is_finite() && factor > 0.0 {
        Ok(factor)
    } else {
        Err(OperationError::InvalidScaleFactor(factor))
    }
}

/// Parse a scale factor from the command line.
pub fn parse_scale_factor(raw: &str) -> Result<f64, OperationError> {
    let factor = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| OperationError::UnparsableScaleFactor(raw.to_string()))?;
    validate_scale_factor(factor)
}
