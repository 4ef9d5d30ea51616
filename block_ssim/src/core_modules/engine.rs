// THEORY:
// The engine is the fail-fast front door of the block computation. It checks
// the two inputs once, derives the grid and constants, and hands the job to a
// backend. Nothing is scheduled until validation has passed, so a bad pair of
// images never produces a partial buffer.

use crate::core_modules::backend::{BlockJob, ExecutionBackend};
use crate::core_modules::block_grid::BlockGrid;
use crate::core_modules::block_stats::StabilizingConstants;
use crate::core_modules::luma::PixelSource;
use crate::core_modules::result_buffer::ResultBuffer;
use crate::error::{Result, SsimError};
use log::debug;

/// Checks that both images are non-empty and the same size.
pub fn validate<X, Y>(image_x: &X, image_y: &Y) -> Result<()>
where
    X: PixelSource + ?Sized,
    Y: PixelSource + ?Sized,
{
    for (width, height) in [
        (image_x.width(), image_x.height()),
        (image_y.width(), image_y.height()),
    ] {
        if width == 0 || height == 0 {
            return Err(SsimError::EmptyImage { width, height });
        }
    }

    if image_x.width() != image_y.width() || image_x.height() != image_y.height() {
        return Err(SsimError::DimensionMismatch {
            x_width: image_x.width(),
            x_height: image_x.height(),
            y_width: image_y.width(),
            y_height: image_y.height(),
        });
    }

    Ok(())
}

/// Validates the inputs and runs every block on `backend`.
pub fn run<B, P>(
    backend: &B,
    image_x: P,
    image_y: P,
    block_size: u32,
    dynamic_range: f32,
) -> Result<(BlockGrid, ResultBuffer)>
where
    B: ExecutionBackend,
    P: PixelSource + Clone + 'static,
{
    validate(&image_x, &image_y)?;
    let grid = BlockGrid::new(image_x.width(), image_x.height(), block_size)?;
    debug!(
        "{}x{} image, {}x{} blocks of {} px on {} backend",
        grid.width(),
        grid.height(),
        grid.block_count_x(),
        grid.block_count_y(),
        block_size,
        backend.name()
    );

    let job = BlockJob {
        image_x,
        image_y,
        grid,
        constants: StabilizingConstants::from_dynamic_range(dynamic_range),
    };
    let buffer = backend.execute(job)?;
    Ok((grid, buffer))
}
