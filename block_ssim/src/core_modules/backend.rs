// THEORY:
// An `ExecutionBackend` decides *where* block computations run; `BlockStats`
// decides *what* each one computes. The contract between them is small: for
// every block index, read both images inside that block's region, compute its
// stats, and write them to that index of the result buffer exactly once.
//
// Because blocks never read each other's output, any schedule is valid: a plain
// loop (`SequentialBackend`), a pool of workers with static bands
// (`worker_pool::WorkerPoolBackend`), or anything else that fills every slot
// before returning.

use crate::core_modules::block_grid::BlockGrid;
use crate::core_modules::block_stats::{BlockStats, StabilizingConstants};
use crate::core_modules::luma::PixelSource;
use crate::core_modules::result_buffer::ResultBuffer;
use crate::error::Result;
use log::trace;

/// Everything a backend needs to compute one comparison.
#[derive(Debug, Clone)]
pub struct BlockJob<P> {
    pub image_x: P,
    pub image_y: P,
    pub grid: BlockGrid,
    pub constants: StabilizingConstants,
}

impl<P: PixelSource> BlockJob<P> {
    /// Computes blocks `start..end` (row-major indices) in order.
    pub fn compute_range(&self, start: usize, end: usize) -> Vec<BlockStats> {
        (start..end)
            .map(|index| {
                let (bx, by) = self.grid.coords(index);
                let region = self.grid.region(bx, by);
                let stats =
                    BlockStats::compute(&self.image_x, &self.image_y, region, self.constants);
                trace!("block ({bx}, {by}) ssim {}", stats.ssim);
                stats
            })
            .collect()
    }
}

pub trait ExecutionBackend {
    fn name(&self) -> &'static str;

    /// Runs every block of `job` and returns the fully populated buffer.
    /// On failure no partial buffer is returned.
    fn execute<P>(&self, job: BlockJob<P>) -> Result<ResultBuffer>
    where
        P: PixelSource + Clone + 'static;
}

/// Computes all blocks in a row-major loop on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialBackend;

impl ExecutionBackend for SequentialBackend {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn execute<P>(&self, job: BlockJob<P>) -> Result<ResultBuffer>
    where
        P: PixelSource + Clone + 'static,
    {
        let count = job.grid.block_count();
        let mut buffer = ResultBuffer::new(count);
        buffer.write_run(0, job.compute_range(0, count))?;
        Ok(buffer)
    }
}
