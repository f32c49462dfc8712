//
// negate.rs
// Image-Tools-rs
//
// Channel complement over a PixelBuffer, either in one pass or split by rows across an image-scoped pool.
//

use crossbeam::channel;
use rayon::ThreadPoolBuilder;
use tracing::debug;

use crate::error::TransformError;
use crate::pixels::{partition_rows, ChannelLayout, PixelBuffer, RowChunk};

/// Pixel count at or above which negation is split across an image-scoped pool.
pub const PARALLEL_THRESHOLD: u64 = 1_000_000;

/// Which negate path a buffer takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegateStrategy {
    Sequential,
    Parallel { workers: usize },
}

impl NegateStrategy {
    pub fn select(pixel_count: u64, threshold: u64, workers: usize) -> Self {
        if pixel_count >= threshold {
            NegateStrategy::Parallel { workers }
        } else {
            NegateStrategy::Sequential
        }
    }
}

/// Negate `source` with whichever strategy its size calls for.
pub fn negate(
    source: &PixelBuffer,
    threshold: u64,
    workers: usize,
) -> Result<PixelBuffer, TransformError> {
    match NegateStrategy::select(source.pixel_count(), threshold, workers) {
        NegateStrategy::Sequential => Ok(negate_sequential(source)),
        NegateStrategy::Parallel { workers } => negate_parallel(source, workers),
    }
}

/// Single pass over every pixel.
pub fn negate_sequential(source: &PixelBuffer) -> PixelBuffer {
    let mut target = PixelBuffer::new(source.width(), source.height(), source.layout());
    complement_into(source.as_bytes(), target.as_bytes_mut(), source.layout());
    target
}

/// Split the rows of `source` into `workers` chunks and negate each on its own thread.
///
/// The pool lives only for this call. Every worker reads the shared source and writes
/// a disjoint row range of the target, so no locking is involved. The first worker
/// error is returned and the partially written target is discarded.
pub fn negate_parallel(
    source: &PixelBuffer,
    workers: usize,
) -> Result<PixelBuffer, TransformError> {
    let chunks = partition_rows(source.height(), workers);
    let layout = source.layout();
    let stride = source.row_stride();
    let mut target = PixelBuffer::new(source.width(), source.height(), layout);

    let pool = ThreadPoolBuilder::new()
        .num_threads(chunks.len())
        .thread_name(|i| format!("negate-{i}"))
        .build()?;
    debug!(
        "negating {}x{} across {} row chunks",
        source.width(),
        source.height(),
        chunks.len()
    );

    let (result_tx, result_rx) = channel::unbounded();
    // Called from a batch worker, the waiting thread may run other batch jobs until this returns.
    pool.scope(|scope| {
        let mut remaining = target.as_bytes_mut();
        for &chunk in &chunks {
            let split = (chunk.len() as usize * stride).min(remaining.len());
            let (rows, rest) = std::mem::take(&mut remaining).split_at_mut(split);
            remaining = rest;
            let src = source.rows(chunk);
            let result_tx = result_tx.clone();
            scope.spawn(move |_| {
                // The receiver outlives the scope, so a send cannot fail here.
                let _ = result_tx.send(negate_chunk(chunk, src, rows, layout, stride));
            });
        }
    });
    drop(result_tx);

    result_rx.iter().collect::<Result<(), TransformError>>()?;
    Ok(target)
}

fn negate_chunk(
    chunk: RowChunk,
    source: &[u8],
    target: &mut [u8],
    layout: ChannelLayout,
    stride: usize,
) -> Result<(), TransformError> {
    if source.len() != target.len() || source.len() != chunk.len() as usize * stride {
        return Err(TransformError::ChunkMismatch {
            start: chunk.start,
            end: chunk.end,
        });
    }
    complement_into(source, target, layout);
    Ok(())
}

/// Write `255 - v` for every colour channel of `source` into `target`; alpha is copied.
fn complement_into(source: &[u8], target: &mut [u8], layout: ChannelLayout) {
    let channels = layout.channels();
    let colors = layout.color_channels();
    for (src, dst) in source
        .chunks_exact(channels)
        .zip(target.chunks_exact_mut(channels))
    {
        for (out, value) in dst[..colors].iter_mut().zip(&src[..colors]) {
            *out = 255 - value;
        }
        dst[colors..].copy_from_slice(&src[colors..]);
    }
}
