// THEORY:
// The `BlockGrid` is the partitioner. It owns no pixels; it is the pure
// arithmetic that maps an image extent onto a grid of square blocks and back.
//
// Key architectural principles:
// 1.  **Ceiling division**: the grid always covers the whole image. A 17 pixel
//     wide image with 8 pixel blocks gets 3 columns, not 2, so the last column
//     of pixels is never silently dropped.
// 2.  **Clipped edge blocks**: a block on the right or bottom edge may reach
//     past the image. Its `BlockRegion` is the intersection of the nominal
//     square with the image, so it is smaller but never empty and never
//     addresses a sample outside the image.
// 3.  **Row-major indexing**: block (bx, by) lives at `by * block_count_x + bx`.
//     This is the layout of the result buffer and the order of `regions()`.
// 4.  **Immutable**: once derived from (width, height, block_size) the grid
//     never changes, so it can be shared freely between workers.

use crate::error::{Result, SsimError};

pub const DEFAULT_BLOCK_SIZE: u32 = 8;

/// Half-open pixel rectangle `[x0, x1) x [y0, y1)` covered by one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRegion {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl BlockRegion {
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn sample_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }
}

/// The block partition of a `width` x `height` image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGrid {
    /// The width of the full image in pixels.
    width: u32,
    /// The height of the full image in pixels.
    height: u32,
    /// The side of a nominal (unclipped) block in pixels.
    block_size: u32,
    /// ceil(width / block_size)
    block_count_x: u32,
    /// ceil(height / block_size)
    block_count_y: u32,
}

impl BlockGrid {
    pub fn new(width: u32, height: u32, block_size: u32) -> Result<Self> {
        if block_size == 0 {
            return Err(SsimError::InvalidBlockSize);
        }
        if width == 0 || height == 0 {
            return Err(SsimError::EmptyImage { width, height });
        }
        let (block_count_x, block_count_y) = block_counts(width, height, block_size);
        Ok(Self {
            width,
            height,
            block_size,
            block_count_x,
            block_count_y,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn block_count_x(&self) -> u32 {
        self.block_count_x
    }

    pub fn block_count_y(&self) -> u32 {
        self.block_count_y
    }

    pub fn block_count(&self) -> usize {
        self.block_count_x as usize * self.block_count_y as usize
    }

    pub fn index(&self, bx: u32, by: u32) -> usize {
        by as usize * self.block_count_x as usize + bx as usize
    }

    pub fn coords(&self, index: usize) -> (u32, u32) {
        let bx = (index % self.block_count_x as usize) as u32;
        let by = (index / self.block_count_x as usize) as u32;
        (bx, by)
    }

    /// The pixel region of block (bx, by), clipped to the image extent.
    pub fn region(&self, bx: u32, by: u32) -> BlockRegion {
        let x0 = bx * self.block_size;
        let y0 = by * self.block_size;
        BlockRegion {
            x0,
            y0,
            x1: x0.saturating_add(self.block_size).min(self.width),
            y1: y0.saturating_add(self.block_size).min(self.height),
        }
    }

    /// All block regions in row-major (result buffer) order.
    pub fn regions(&self) -> impl Iterator<Item = BlockRegion> + '_ {
        (0..self.block_count()).map(move |i| {
            let (bx, by) = self.coords(i);
            self.region(bx, by)
        })
    }
}

/// Number of blocks along each axis, by ceiling division.
pub fn block_counts(width: u32, height: u32, block_size: u32) -> (u32, u32) {
    (width.div_ceil(block_size), height.div_ceil(block_size))
}
