//
// image.rs
// Image-Tools-rs
//
// Decoding, bilinear scaling, and re-encoding of image files in the format implied by their extension.
//

use std::fs;
use std::io::Cursor;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageFormat, ImageReader};

use crate::error::ProcessError;

/// Decode a file, sniffing the actual content rather than trusting the extension.
pub fn open(path: &Path) -> Result<DynamicImage, ProcessError> {
    let decode_error = |source: ImageError| ProcessError::Decode {
        path: path.to_path_buf(),
        source,
    };
    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| decode_error(ImageError::IoError(e)))?
        .decode()
        .map_err(decode_error)
}

/// `floor(width * factor)` by `floor(height * factor)`, or `None` if either side ends up
/// empty or beyond what an image can hold.
pub fn scaled_dimensions(width: u32, height: u32, factor: f64) -> Option<(u32, u32)> {
    let scale = |side: u32| {
        let scaled = (f64::from(side) * factor).floor();
        (1.0..=f64::from(u32::MAX))
            .contains(&scaled)
            .then_some(scaled as u32)
    };
    Some((scale(width)?, scale(height)?))
}

/// Resample with bilinear interpolation to the scaled dimensions.
pub fn scale(image: &DynamicImage, factor: f64) -> Result<DynamicImage, ProcessError> {
    let (width, height) = (image.width(), image.height());
    let (new_width, new_height) =
        scaled_dimensions(width, height, factor).ok_or(ProcessError::InvalidScale {
            width,
            height,
            factor,
        })?;
    Ok(image.resize_exact(new_width, new_height, FilterType::Triangle))
}

pub fn encode_image(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ImageError> {
    // JPEG has no alpha channel.
    let flattened;
    let image = if format == ImageFormat::Jpeg && image.color().has_alpha() {
        flattened = if image.color().has_color() {
            DynamicImage::ImageRgb8(image.to_rgb8())
        } else {
            DynamicImage::ImageLuma8(image.to_luma8())
        };
        &flattened
    } else {
        image
    };

    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), format)?;
    Ok(buffer)
}

/// Encode fully in memory, then replace the file. A failed encode leaves the original intact.
pub fn save_in_place(
    path: &Path,
    image: &DynamicImage,
    format: ImageFormat,
) -> Result<(), ProcessError> {
    let bytes = encode_image(image, format).map_err(|source| ProcessError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, bytes).map_err(|source| ProcessError::Write {
        path: path.to_path_buf(),
        source,
    })
}
