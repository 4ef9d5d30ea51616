// THEORY:
// The `WorkerPoolBackend` is the parallel execution substrate. It owns its own
// tokio runtime, created when the backend is constructed and shut down when it
// is dropped, so there is no process-wide device or pool to initialize.
//
// Scheduling is static: the block rows of the grid are cut into contiguous
// bands, one per worker, and each band runs as a single blocking task. Bands
// write disjoint index ranges of the result buffer, so no locking is needed.
// `join_all` is the one barrier: the buffer is assembled only after every band
// has finished, and if any band fails the whole result is discarded.

use crate::core_modules::backend::{BlockJob, ExecutionBackend};
use crate::core_modules::block_grid::BlockGrid;
use crate::core_modules::luma::PixelSource;
use crate::core_modules::result_buffer::ResultBuffer;
use crate::error::{Result, SsimError};
use futures::future::join_all;
use log::debug;
use std::ops::Range;
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};

pub struct WorkerPoolBackend {
    runtime: Option<Runtime>,
    workers: usize,
}

impl WorkerPoolBackend {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(SsimError::InvalidWorkerCount);
        }
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .max_blocking_threads(workers)
            .thread_name("block-ssim-worker")
            .enable_all()
            .build()
            .map_err(|e| SsimError::backend(format!("failed to start worker runtime: {e}")))?;
        debug!("worker pool started with {workers} workers");
        Ok(Self {
            runtime: Some(runtime),
            workers,
        })
    }

    /// One worker per logical CPU.
    pub fn with_default_workers() -> Result<Self> {
        Self::new(num_cpus::get().max(1))
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `job` on the caller's runtime, split into `workers` bands.
    /// Use this instead of `execute` from inside async code.
    pub async fn execute_async<P>(job: BlockJob<P>, workers: usize) -> Result<ResultBuffer>
    where
        P: PixelSource + 'static,
    {
        let bands = row_bands(&job.grid, workers.max(1));
        let mut buffer = ResultBuffer::new(job.grid.block_count());
        let job = Arc::new(job);

        let tasks = bands.into_iter().map(|band| {
            let job = Arc::clone(&job);
            tokio::task::spawn_blocking(move || {
                (band.start, job.compute_range(band.start, band.end))
            })
        });

        for joined in join_all(tasks).await {
            let (start, run) =
                joined.map_err(|e| SsimError::backend(format!("block worker failed: {e}")))?;
            buffer.write_run(start, run)?;
        }

        Ok(buffer)
    }
}

impl ExecutionBackend for WorkerPoolBackend {
    fn name(&self) -> &'static str {
        "worker-pool"
    }

    fn execute<P>(&self, job: BlockJob<P>) -> Result<ResultBuffer>
    where
        P: PixelSource + Clone + 'static,
    {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| SsimError::backend("worker runtime already shut down"))?;
        let work = Self::execute_async(job, self.workers);

        // Blocking on our runtime from inside another one panics unless the
        // caller's worker thread is first handed over to the blocking pool.
        match Handle::try_current() {
            Err(_) => runtime.block_on(work),
            Ok(caller) if caller.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| runtime.block_on(work))
            }
            Ok(_) => Err(SsimError::backend(
                "cannot block a current-thread runtime; use execute_async inside a runtime",
            )),
        }
    }
}

impl Drop for WorkerPoolBackend {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Splits the grid's block rows into at most `bands` contiguous index ranges.
pub fn row_bands(grid: &BlockGrid, bands: usize) -> Vec<Range<usize>> {
    let rows = grid.block_count_y() as usize;
    let row_len = grid.block_count_x() as usize;
    let rows_per_band = rows.div_ceil(bands.max(1));

    (0..rows)
        .step_by(rows_per_band)
        .map(|first_row| {
            let last_row = (first_row + rows_per_band).min(rows);
            first_row * row_len..last_row * row_len
        })
        .collect()
}
