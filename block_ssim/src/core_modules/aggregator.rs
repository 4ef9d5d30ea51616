// THEORY:
// The aggregator reduces the populated result buffer to a single score: the
// unweighted arithmetic mean of every block's SSIM. A clipped edge block with a
// handful of samples counts exactly as much as a full block.
//
// NaN/Inf block scores are not filtered. They come from degenerate inputs and
// propagate into the mean so the caller can see them.

use crate::core_modules::block_grid::BlockGrid;
use crate::core_modules::result_buffer::ResultBuffer;
use crate::error::{Result, SsimError};

/// Mean SSIM over all blocks of `grid`.
///
/// Fails with `IncompleteResult` if the buffer does not match the grid or any
/// slot was never written. The check runs before any summation.
pub fn aggregate(buffer: &ResultBuffer, grid: &BlockGrid) -> Result<f32> {
    let expected = grid.block_count();
    if buffer.len() != expected || !buffer.is_complete() {
        return Err(SsimError::IncompleteResult {
            expected,
            written: buffer.written(),
        });
    }

    let sum: f64 = buffer.iter().flatten().map(|stats| stats.ssim as f64).sum();
    Ok((sum / expected as f64) as f32)
}

/// Number of blocks whose SSIM is NaN or infinite.
pub fn count_degenerate(buffer: &ResultBuffer) -> usize {
    buffer
        .iter()
        .flatten()
        .filter(|stats| stats.is_degenerate())
        .count()
}
