//
// pixels.rs
// Image-Tools-rs
//
// Packed 8-bit pixel storage shared by the negate strategies, plus the row partitioning used to split it.
//

use std::ops::Range;

use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};

use crate::error::TransformError;

/// Channel arrangement of one packed pixel. Alpha, when present, is always last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Luma,
    LumaAlpha,
    Rgb,
    Rgba,
}

impl ChannelLayout {
    pub fn channels(self) -> usize {
        match self {
            ChannelLayout::Luma => 1,
            ChannelLayout::LumaAlpha => 2,
            ChannelLayout::Rgb => 3,
            ChannelLayout::Rgba => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, ChannelLayout::LumaAlpha | ChannelLayout::Rgba)
    }

    /// Channels that carry colour intensity, i.e. everything except alpha.
    pub fn color_channels(self) -> usize {
        self.channels() - usize::from(self.has_alpha())
    }
}

/// Width x height grid of packed 8-bit channels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    layout: ChannelLayout,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Zero-filled buffer of the given shape.
    pub fn new(width: u32, height: u32, layout: ChannelLayout) -> Self {
        let len = width as usize * height as usize * layout.channels();
        Self {
            width,
            height,
            layout,
            data: vec![0; len],
        }
    }

    pub fn from_raw(
        width: u32,
        height: u32,
        layout: ChannelLayout,
        data: Vec<u8>,
    ) -> Result<Self, TransformError> {
        if data.len() != width as usize * height as usize * layout.channels() {
            return Err(TransformError::BufferSize {
                width,
                height,
                layout,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    /// Normalise a decoded image to an 8-bit layout, keeping alpha only when the source has it.
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        let color = image.color();
        let (width, height) = (image.width(), image.height());
        let (layout, data) = match (color.has_color(), color.has_alpha()) {
            (false, false) => (ChannelLayout::Luma, image.to_luma8().into_raw()),
            (false, true) => (ChannelLayout::LumaAlpha, image.to_luma_alpha8().into_raw()),
            (true, false) => (ChannelLayout::Rgb, image.to_rgb8().into_raw()),
            (true, true) => (ChannelLayout::Rgba, image.to_rgba8().into_raw()),
        };
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    pub fn into_dynamic(self) -> Result<DynamicImage, TransformError> {
        let Self {
            width,
            height,
            layout,
            data,
        } = self;
        let len = data.len();
        let image = match layout {
            ChannelLayout::Luma => {
                GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8)
            }
            ChannelLayout::LumaAlpha => {
                GrayAlphaImage::from_raw(width, height, data).map(DynamicImage::ImageLumaA8)
            }
            ChannelLayout::Rgb => {
                RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8)
            }
            ChannelLayout::Rgba => {
                RgbaImage::from_raw(width, height, data).map(DynamicImage::ImageRgba8)
            }
        };
        image.ok_or(TransformError::BufferSize {
            width,
            height,
            layout,
            len,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Bytes per row.
    pub fn row_stride(&self) -> usize {
        self.width as usize * self.layout.channels()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes backing the rows of `chunk`.
    pub fn rows(&self, chunk: RowChunk) -> &[u8] {
        let stride = self.row_stride();
        &self.data[chunk.start as usize * stride..chunk.end as usize * stride]
    }
}

/// Half-open row range `[start, end)` owned by a single worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowChunk {
    pub start: u32,
    pub end: u32,
}

impl RowChunk {
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<u32> {
        self.start..self.end
    }
}

/// Split `[0, height)` into `workers` contiguous chunks of `height / workers` rows.
///
/// The last chunk absorbs the remainder, so the chunks always cover every row exactly once.
/// When `height < workers` the leading chunks are empty.
pub fn partition_rows(height: u32, workers: usize) -> Vec<RowChunk> {
    let workers = workers.max(1) as u32;
    let base = height / workers;
    (0..workers)
        .map(|i| RowChunk {
            start: i * base,
            end: if i == workers - 1 { height } else { (i + 1) * base },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, LumaA, Rgb};

    fn assert_disjoint_cover(height: u32, workers: usize) {
        let chunks = partition_rows(height, workers);
        assert_eq!(chunks.len(), workers.max(1));
        let mut owners = vec![0u32; height as usize];
        for chunk in &chunks {
            assert!(chunk.start <= chunk.end);
            for row in chunk.range() {
                owners[row as usize] += 1;
            }
        }
        assert!(
            owners.iter().all(|&n| n == 1),
            "height {height} workers {workers}: {chunks:?}"
        );
    }

    #[test]
    fn remainder_goes_to_last_chunk() {
        let chunks = partition_rows(10, 3);
        assert_eq!(
            chunks,
            vec![
                RowChunk { start: 0, end: 3 },
                RowChunk { start: 3, end: 6 },
                RowChunk { start: 6, end: 10 },
            ]
        );
    }

    #[test]
    fn partition_is_a_disjoint_cover() {
        for height in 1..=64 {
            for workers in 1..=17 {
                assert_disjoint_cover(height, workers);
            }
        }
        assert_disjoint_cover(4321, 12);
    }

    #[test]
    fn fewer_rows_than_workers_leaves_leading_chunks_empty() {
        let chunks = partition_rows(2, 4);
        assert!(chunks[..3].iter().all(RowChunk::is_empty));
        assert_eq!(chunks[3], RowChunk { start: 0, end: 2 });
    }

    #[test]
    fn zero_workers_behaves_like_one() {
        assert_eq!(partition_rows(7, 0), vec![RowChunk { start: 0, end: 7 }]);
    }

    #[test]
    fn from_raw_rejects_wrong_length() {
        let err = PixelBuffer::from_raw(2, 2, ChannelLayout::Rgb, vec![0; 11]).unwrap_err();
        assert!(matches!(err, TransformError::BufferSize { len: 11, .. }));
    }

    #[test]
    fn layout_follows_source_color_type() {
        let gray = DynamicImage::ImageLuma8(image::ImageBuffer::from_pixel(3, 2, Luma([7u8])));
        let buffer = PixelBuffer::from_dynamic(&gray);
        assert_eq!(buffer.layout(), ChannelLayout::Luma);
        assert_eq!(buffer.row_stride(), 3);

        let gray_alpha =
            DynamicImage::ImageLumaA8(image::ImageBuffer::from_pixel(1, 1, LumaA([7u8, 9])));
        assert_eq!(
            PixelBuffer::from_dynamic(&gray_alpha).layout(),
            ChannelLayout::LumaAlpha
        );

        let wide = DynamicImage::ImageRgb16(image::ImageBuffer::from_pixel(2, 2, Rgb([0u16, 65535, 0])));
        let buffer = PixelBuffer::from_dynamic(&wide);
        assert_eq!(buffer.layout(), ChannelLayout::Rgb);
        assert_eq!(&buffer.as_bytes()[..3], &[0, 255, 0]);
    }

    #[test]
    fn dynamic_conversion_keeps_pixels() {
        let rgba = RgbaImage::from_fn(4, 3, |x, y| image::Rgba([x as u8, y as u8, 9, 200]));
        let buffer = PixelBuffer::from_dynamic(&DynamicImage::ImageRgba8(rgba.clone()));
        assert_eq!(buffer.rows(RowChunk { start: 1, end: 2 }).len(), 16);
        let back = buffer.into_dynamic().expect("rebuild");
        assert_eq!(back.to_rgba8(), rgba);
    }
}
