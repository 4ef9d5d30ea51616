// THEORY:
// Every failure the engine can report lives in one enum. Input problems
// (`DimensionMismatch`, `EmptyImage`) are caught before any block is touched,
// buffer problems (`IncompleteResult`, slot errors) are caught before the
// reduction starts, and scheduling problems surface as `Backend`. Nothing is
// retried: the inputs are plain data, so a retry would fail the same way.
//
// Degenerate blocks (a NaN/Inf SSIM) are deliberately NOT an error. They are
// logged and counted by the pipeline, and their value flows into the mean.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SsimError {
    #[error("image dimensions differ: {x_width}x{x_height} vs {y_width}x{y_height}")]
    DimensionMismatch {
        x_width: u32,
        x_height: u32,
        y_width: u32,
        y_height: u32,
    },

    #[error("image has zero extent: {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    #[error("block size must be at least 1")]
    InvalidBlockSize,

    #[error("dynamic range must be finite and non-negative, got {0}")]
    InvalidDynamicRange(f32),

    #[error("worker count must be at least 1")]
    InvalidWorkerCount,

    #[error("expected {expected} samples for the image extent, got {actual}")]
    SampleCountMismatch { expected: usize, actual: usize },

    #[error("result buffer incomplete: {written} of {expected} blocks written")]
    IncompleteResult { expected: usize, written: usize },

    #[error("block index {index} is outside the result buffer (len {len})")]
    SlotOutOfRange { index: usize, len: usize },

    #[error("block {0} was written twice")]
    SlotAlreadyWritten(usize),

    #[error("execution backend failed: {0}")]
    Backend(String),

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),
}

impl SsimError {
    pub fn backend<T: ToString>(msg: T) -> Self {
        SsimError::Backend(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SsimError>;
