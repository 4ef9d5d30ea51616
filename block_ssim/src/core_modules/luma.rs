// THEORY:
// The `luma` module is the lowest layer of the engine: a single scalar
// luminance sample per pixel. SSIM in this crate is computed on one channel, so
// every input (decoded file, RGBA frame buffer, synthetic test pattern) is
// reduced to a plane of `f32` samples before the block engine sees it.
//
// Key principles:
// 1.  **Abstract source**: the engine only reads through `PixelSource`, so any
//     2D grid of samples can be compared without copying it into our type.
// 2.  **Shared, read-only storage**: `LumaImage` keeps its samples behind an
//     `Arc<[f32]>`. Cloning is a pointer bump, which lets every worker thread
//     hold its own handle to the same plane with no locking.
// 3.  **One convention**: samples produced here are normalized to [0, 1]. The
//     default dynamic range (`L = 1.0`) assumes this.

use crate::error::{Result, SsimError};
use std::sync::Arc;

pub type Sample = f32;

/// Rec. 601 luma weights.
const LUMA_RED: f32 = 0.299;
const LUMA_GREEN: f32 = 0.587;
const LUMA_BLUE: f32 = 0.114;
const CHANNELS: usize = 4;

/// A 2D grid of luminance samples addressable by (x, y).
pub trait PixelSource: Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Reads the sample at (x, y). Callers stay within `width` x `height`.
    fn sample(&self, x: u32, y: u32) -> Sample;
}

/// An owned, row-major plane of luminance samples.
#[derive(Debug, Clone, PartialEq)]
pub struct LumaImage {
    width: u32,
    height: u32,
    samples: Arc<[Sample]>,
}

impl LumaImage {
    pub fn new(width: u32, height: u32, samples: Vec<Sample>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if samples.len() != expected {
            return Err(SsimError::SampleCountMismatch {
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            samples: samples.into(),
        })
    }

    /// Builds an image by evaluating `f(x, y)` for every pixel in row-major order.
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> Sample,
    {
        let mut samples = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                samples.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            samples: samples.into(),
        }
    }

    pub fn filled(width: u32, height: u32, value: Sample) -> Self {
        Self::from_fn(width, height, |_, _| value)
    }

    /// Converts a tightly packed RGBA8 buffer into normalized luma.
    /// Alpha does not contribute.
    pub fn from_rgba8(width: u32, height: u32, bytes: &[u8]) -> Result<Self> {
        let expected = width as usize * height as usize * CHANNELS;
        if bytes.len() != expected {
            return Err(SsimError::SampleCountMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let samples: Vec<Sample> = bytes
            .chunks_exact(CHANNELS)
            .map(|px| {
                let luma = LUMA_RED * px[0] as f32
                    + LUMA_GREEN * px[1] as f32
                    + LUMA_BLUE * px[2] as f32;
                luma / 255.0
            })
            .collect();

        Self::new(width, height, samples)
    }

    /// Returns a new image with `f` applied to every sample.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(Sample) -> Sample,
    {
        Self {
            width: self.width,
            height: self.height,
            samples: self.samples.iter().map(|&s| f(s)).collect(),
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

impl PixelSource for LumaImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn sample(&self, x: u32, y: u32) -> Sample {
        self.samples[y as usize * self.width as usize + x as usize]
    }
}
