// THEORY:
// The `pipeline` module is the top-level API of the engine. It wires the three
// stages together for a caller:
//
//   1. Partition: derive the `BlockGrid` from the image size and block size.
//   2. Compute: run every block on the configured `ExecutionBackend`.
//   3. Reduce: wait for the backend to finish, then average the block scores.
//
// Callers who only want a number use `compute_similarity`. Callers who want to
// look at the map of per-block scores use `SsimPipeline::compare` and read the
// `SimilarityReport`.

use crate::core_modules::aggregator;
use crate::core_modules::backend::{ExecutionBackend, SequentialBackend};
use crate::core_modules::block_grid::DEFAULT_BLOCK_SIZE;
use crate::core_modules::engine;
use crate::core_modules::luma::PixelSource;
use crate::error::{Result, SsimError};
use crate::worker_pool::WorkerPoolBackend;
use log::{debug, warn};

// Re-export key data structures for the public API.
pub use crate::core_modules::block_stats::BlockStats;
pub use crate::core_modules::luma::LumaImage;

/// Samples are expected in [0, 1], so the default dynamic range is 1.
pub const DEFAULT_DYNAMIC_RANGE: f32 = 1.0;

/// Configuration for the SsimPipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SsimConfig {
    /// Side of a square block in pixels.
    pub block_size: u32,
    /// The dynamic range `L` of a sample, used for `C1 = (0.01 L)^2` and
    /// `C2 = (0.03 L)^2`. Use 1.0 for normalized samples, 255.0 for byte-valued ones.
    pub dynamic_range: f32,
    /// Worker count for the worker pool backend. `None` means one per CPU.
    pub workers: Option<usize>,
}

impl Default for SsimConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            dynamic_range: DEFAULT_DYNAMIC_RANGE,
            workers: None,
        }
    }
}

impl SsimConfig {
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(SsimError::InvalidBlockSize);
        }
        if !self.dynamic_range.is_finite() || self.dynamic_range < 0.0 {
            return Err(SsimError::InvalidDynamicRange(self.dynamic_range));
        }
        if self.workers == Some(0) {
            return Err(SsimError::InvalidWorkerCount);
        }
        Ok(())
    }
}

/// The full outcome of one comparison.
#[derive(Debug, Clone)]
pub struct SimilarityReport {
    /// Unweighted mean of the per-block SSIM values.
    pub score: f32,
    pub block_count_x: u32,
    pub block_count_y: u32,
    /// Row-major, one entry per block.
    pub blocks: Vec<BlockStats>,
    /// Blocks whose SSIM came out NaN or infinite.
    pub degenerate_blocks: usize,
}

impl SimilarityReport {
    pub fn block(&self, bx: u32, by: u32) -> Option<&BlockStats> {
        if bx >= self.block_count_x || by >= self.block_count_y {
            return None;
        }
        self.blocks
            .get(by as usize * self.block_count_x as usize + bx as usize)
    }

    /// Block coordinates (bx, by) of the row-major entry `index` in `blocks`.
    pub fn coords(&self, index: usize) -> (u32, u32) {
        let row_len = self.block_count_x.max(1) as usize;
        ((index % row_len) as u32, (index / row_len) as u32)
    }

    /// Every block with its coordinates, in row-major order.
    pub fn iter_blocks(&self) -> impl Iterator<Item = ((u32, u32), &BlockStats)> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .map(|(index, stats)| (self.coords(index), stats))
    }
}

/// The main entry point: a configuration bound to an execution backend.
pub struct SsimPipeline<B: ExecutionBackend> {
    config: SsimConfig,
    backend: B,
}

impl<B: ExecutionBackend> SsimPipeline<B> {
    pub fn new(config: SsimConfig, backend: B) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, backend })
    }

    pub fn config(&self) -> &SsimConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn compare<P>(&self, image_x: &P, image_y: &P) -> Result<SimilarityReport>
    where
        P: PixelSource + Clone + 'static,
    {
        let (grid, buffer) = engine::run(
            &self.backend,
            image_x.clone(),
            image_y.clone(),
            self.config.block_size,
            self.config.dynamic_range,
        )?;

        let score = aggregator::aggregate(&buffer, &grid)?;

        let degenerate_blocks = aggregator::count_degenerate(&buffer);
        if degenerate_blocks > 0 {
            for (index, stats) in buffer.iter().enumerate() {
                if let Some(stats) = stats.filter(|s| s.is_degenerate()) {
                    let (bx, by) = grid.coords(index);
                    warn!(
                        "degenerate block ({bx}, {by}): ssim {} (var {} / {}, mean {} / {})",
                        stats.ssim, stats.var_x, stats.var_y, stats.mean_x, stats.mean_y
                    );
                }
            }
        }
        debug!("mean ssim {score} over {} blocks", grid.block_count());

        Ok(SimilarityReport {
            score,
            block_count_x: grid.block_count_x(),
            block_count_y: grid.block_count_y(),
            blocks: buffer.into_stats()?,
            degenerate_blocks,
        })
    }

    pub fn compute_similarity<P>(&self, image_x: &P, image_y: &P) -> Result<f32>
    where
        P: PixelSource + Clone + 'static,
    {
        self.compare(image_x, image_y).map(|report| report.score)
    }
}

impl SsimPipeline<WorkerPoolBackend> {
    /// Builds a pipeline backed by a worker pool sized from `config.workers`.
    pub fn with_worker_pool(config: SsimConfig) -> Result<Self> {
        config.validate()?;
        let backend = match config.workers {
            Some(workers) => WorkerPoolBackend::new(workers)?,
            None => WorkerPoolBackend::with_default_workers()?,
        };
        Self::new(config, backend)
    }
}

/// Mean block SSIM of two same-sized images, computed on the calling thread.
pub fn compute_similarity<P>(
    image_x: &P,
    image_y: &P,
    block_size: u32,
    dynamic_range: f32,
) -> Result<f32>
where
    P: PixelSource + Clone + 'static,
{
    let config = SsimConfig {
        block_size,
        dynamic_range,
        workers: None,
    };
    SsimPipeline::new(config, SequentialBackend)?.compute_similarity(image_x, image_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, LevelFilter, Log, Metadata, Record};
    use std::sync::Mutex;

    fn texture(width: u32, height: u32) -> LumaImage {
        LumaImage::from_fn(width, height, |x, y| {
            ((x * 37 + y * 11) % 97) as f32 / 96.0
        })
    }

    #[test]
    fn default_config_uses_eight_pixel_blocks_and_unit_range() {
        let config = SsimConfig::default();
        assert_eq!(config.block_size, 8);
        assert_eq!(config.dynamic_range, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_validation_rejects_bad_values() {
        let bad_block = SsimConfig {
            block_size: 0,
            ..SsimConfig::default()
        };
        assert!(matches!(
            bad_block.validate(),
            Err(SsimError::InvalidBlockSize)
        ));

        let bad_range = SsimConfig {
            dynamic_range: -1.0,
            ..SsimConfig::default()
        };
        assert!(matches!(
            bad_range.validate(),
            Err(SsimError::InvalidDynamicRange(_))
        ));

        let nan_range = SsimConfig {
            dynamic_range: f32::NAN,
            ..SsimConfig::default()
        };
        assert!(nan_range.validate().is_err());

        let no_workers = SsimConfig {
            workers: Some(0),
            ..SsimConfig::default()
        };
        assert!(matches!(
            SsimPipeline::with_worker_pool(no_workers),
            Err(SsimError::InvalidWorkerCount)
        ));
    }

    #[test]
    fn identical_images_score_one() {
        let x = texture(40, 24);
        let score = compute_similarity(&x, &x, 8, 1.0).unwrap();
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn uniform_hundred_single_block_scenario() {
        let x = LumaImage::filled(8, 8, 100.0);
        let pipeline = SsimPipeline::new(
            SsimConfig {
                dynamic_range: 255.0,
                ..SsimConfig::default()
            },
            SequentialBackend,
        )
        .unwrap();
        let report = pipeline.compare(&x, &x.clone()).unwrap();
        assert_eq!(report.blocks.len(), 1);
        let block = report.block(0, 0).unwrap();
        assert_eq!(block.mean_x, 100.0);
        assert_eq!(block.mean_y, 100.0);
        assert_eq!(block.cov_xy, 0.0);
        assert!((report.score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn report_has_one_entry_per_block() {
        let x = texture(17, 10);
        let y = x.map(|s| 1.0 - s);
        let pipeline = SsimPipeline::new(SsimConfig::default(), SequentialBackend).unwrap();
        let report = pipeline.compare(&x, &y).unwrap();
        assert_eq!((report.block_count_x, report.block_count_y), (3, 2));
        assert_eq!(report.blocks.len(), 6);
        assert!(report.block(3, 0).is_none());
        assert!(report.score < 1.0);
        assert_eq!(report.degenerate_blocks, 0);
    }

    /// Keeps every warning the crate logs so tests can inspect them.
    struct WarningLog {
        lines: Mutex<Vec<String>>,
    }

    impl Log for WarningLog {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= Level::Warn && metadata.target().starts_with("block_ssim")
        }

        fn log(&self, record: &Record) {
            if self.enabled(record.metadata()) {
                if let Ok(mut lines) = self.lines.lock() {
                    lines.push(record.args().to_string());
                }
            }
        }

        fn flush(&self) {}
    }

    static WARNINGS: WarningLog = WarningLog {
        lines: Mutex::new(Vec::new()),
    };

    fn capture_warnings() -> &'static WarningLog {
        // Another test may have installed it already.
        let _ = log::set_logger(&WARNINGS);
        log::set_max_level(LevelFilter::Warn);
        &WARNINGS
    }

    #[test]
    fn degenerate_blocks_are_counted_not_fatal() {
        let warnings = capture_warnings();
        let x = LumaImage::filled(16, 8, 0.0);
        let config = SsimConfig {
            dynamic_range: 0.0,
            ..SsimConfig::default()
        };
        let pipeline = SsimPipeline::new(config, SequentialBackend).unwrap();
        let report = pipeline.compare(&x, &x.clone()).unwrap();
        assert_eq!(report.degenerate_blocks, 2);
        assert!(report.score.is_nan());

        let lines = warnings.lines.lock().unwrap();
        for coords in ["(0, 0)", "(1, 0)"] {
            assert!(
                lines
                    .iter()
                    .any(|l| l.starts_with(&format!("degenerate block {coords}"))),
                "no warning for block {coords} in {lines:?}"
            );
        }
    }

    #[test]
    fn coords_follow_row_major_layout() {
        let x = texture(17, 10);
        let pipeline = SsimPipeline::new(SsimConfig::default(), SequentialBackend).unwrap();
        let report = pipeline.compare(&x, &x.clone()).unwrap();
        assert_eq!(report.coords(0), (0, 0));
        assert_eq!(report.coords(2), (2, 0));
        assert_eq!(report.coords(4), (1, 1));
        for ((bx, by), stats) in report.iter_blocks() {
            assert_eq!(report.block(bx, by), Some(stats));
        }
        assert_eq!(report.iter_blocks().count(), 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn worker_pool_pipeline_runs_from_async_code() {
        let x = texture(40, 24);
        let config = SsimConfig {
            workers: Some(2),
            ..SsimConfig::default()
        };
        let pooled = SsimPipeline::with_worker_pool(config).unwrap();
        let score = pooled.compute_similarity(&x, &x.clone()).unwrap();
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn worker_pool_and_sequential_agree() {
        let x = texture(70, 33);
        let y = x.map(|s| (s * 0.8 + 0.05).min(1.0));
        let config = SsimConfig {
            workers: Some(3),
            ..SsimConfig::default()
        };
        let pooled = SsimPipeline::with_worker_pool(config).unwrap();
        let sequential = compute_similarity(&x, &y, 8, 1.0).unwrap();
        let parallel = pooled.compute_similarity(&x, &y).unwrap();
        assert_eq!(parallel, sequential);
        assert_eq!(pooled.backend().workers(), 3);
    }
}
