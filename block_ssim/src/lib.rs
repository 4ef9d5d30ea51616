// THEORY:
// This file is the main entry point for the `block_ssim` library crate.
// The public face of the engine is the `pipeline` module: `SsimConfig`,
// `SsimPipeline`, `SimilarityReport` and the one-shot `compute_similarity`.
//
// The building blocks (`core_modules`) stay public so callers can plug in their
// own `PixelSource` or `ExecutionBackend`, but most users never need them.
// `worker_pool` holds the parallel backend, and `error` the single error type
// shared by every stage.

pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod worker_pool;

pub use error::{Result, SsimError};
pub use pipeline::{SimilarityReport, SsimConfig, SsimPipeline, compute_similarity};
