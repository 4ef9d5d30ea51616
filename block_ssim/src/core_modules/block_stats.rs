// THEORY:
// `BlockStats` is the per-block unit of work. Given the two images and one
// clipped `BlockRegion`, it computes the five summary statistics and the SSIM
// value for that region. It reads only from the two read-only inputs and
// produces one value, so any number of blocks can be computed at once.
//
// Statistics are population moments (divide by N). Sums are accumulated in
// f64 and the record is stored as f32.

use crate::core_modules::block_grid::BlockRegion;
use crate::core_modules::luma::PixelSource;

const K1: f64 = 0.01;
const K2: f64 = 0.03;

/// The stabilizing constants of the two-constant SSIM formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilizingConstants {
    pub c1: f64,
    pub c2: f64,
}

impl StabilizingConstants {
    /// `C1 = (0.01 L)^2`, `C2 = (0.03 L)^2` where `L` is the sample dynamic range.
    pub fn from_dynamic_range(dynamic_range: f32) -> Self {
        let l = dynamic_range as f64;
        Self {
            c1: (K1 * l).powi(2),
            c2: (K2 * l).powi(2),
        }
    }
}

/// Summary statistics and SSIM for one block.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlockStats {
    pub mean_x: f32,
    pub mean_y: f32,
    pub var_x: f32,
    pub var_y: f32,
    pub cov_xy: f32,
    pub ssim: f32,
}

impl BlockStats {
    /// Computes the statistics of `region` over both images.
    ///
    /// `region` must be non-empty and lie inside both images; `BlockGrid`
    /// guarantees this for every region it hands out.
    pub fn compute<X, Y>(
        image_x: &X,
        image_y: &Y,
        region: BlockRegion,
        constants: StabilizingConstants,
    ) -> Self
    where
        X: PixelSource + ?Sized,
        Y: PixelSource + ?Sized,
    {
        let count = region.sample_count() as f64;

        // First pass: means.
        let mut sum_x = 0.0f64;
        let mut sum_y = 0.0f64;
        for y in region.y0..region.y1 {
            for x in region.x0..region.x1 {
                sum_x += image_x.sample(x, y) as f64;
                sum_y += image_y.sample(x, y) as f64;
            }
        }
        let mean_x = sum_x / count;
        let mean_y = sum_y / count;

        // Second pass: centered moments, which stay exact for constant blocks.
        let mut sum_xx = 0.0f64;
        let mut sum_yy = 0.0f64;
        let mut sum_xy = 0.0f64;
        for y in region.y0..region.y1 {
            for x in region.x0..region.x1 {
                let dx = image_x.sample(x, y) as f64 - mean_x;
                let dy = image_y.sample(x, y) as f64 - mean_y;
                sum_xx += dx * dx;
                sum_yy += dy * dy;
                sum_xy += dx * dy;
            }
        }
        let var_x = sum_xx / count;
        let var_y = sum_yy / count;
        let cov_xy = sum_xy / count;

        let ssim = ssim_from_moments(mean_x, mean_y, var_x, var_y, cov_xy, constants);

        Self {
            mean_x: mean_x as f32,
            mean_y: mean_y as f32,
            var_x: var_x as f32,
            var_y: var_y as f32,
            cov_xy: cov_xy as f32,
            ssim: ssim as f32,
        }
    }

    /// True when the SSIM value is NaN or infinite.
    pub fn is_degenerate(&self) -> bool {
        !self.ssim.is_finite()
    }
}

/// `((2 mx my + C1)(2 cov + C2)) / ((mx^2 + my^2 + C1)(vx + vy + C2))`
pub fn ssim_from_moments(
    mean_x: f64,
    mean_y: f64,
    var_x: f64,
    var_y: f64,
    cov_xy: f64,
    constants: StabilizingConstants,
) -> f64 {
    let StabilizingConstants { c1, c2 } = constants;
    let numerator = (2.0 * mean_x * mean_y + c1) * (2.0 * cov_xy + c2);
    let denominator = (mean_x * mean_x + mean_y * mean_y + c1) * (var_x + var_y + c2);
    numerator / denominator
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::luma::LumaImage;

    fn full(size: u32) -> BlockRegion {
        BlockRegion {
            x0: 0,
            y0: 0,
            x1: size,
            y1: size,
        }
    }

    fn unit() -> StabilizingConstants {
        StabilizingConstants::from_dynamic_range(1.0)
    }

    #[test]
    fn constants_follow_dynamic_range() {
        let c = StabilizingConstants::from_dynamic_range(255.0);
        assert!((c.c1 - 6.5025).abs() < 1e-9);
        assert!((c.c2 - 58.5225).abs() < 1e-9);
        let c = unit();
        assert!((c.c1 - 1e-4).abs() < 1e-12);
        assert!((c.c2 - 9e-4).abs() < 1e-12);
    }

    #[test]
    fn uniform_hundred_block_is_identical() {
        let x = LumaImage::filled(8, 8, 100.0);
        let y = LumaImage::filled(8, 8, 100.0);
        let stats = BlockStats::compute(
            &x,
            &y,
            full(8),
            StabilizingConstants::from_dynamic_range(255.0),
        );
        assert_eq!(stats.mean_x, 100.0);
        assert_eq!(stats.mean_y, 100.0);
        assert_eq!(stats.var_x, 0.0);
        assert_eq!(stats.var_y, 0.0);
        assert_eq!(stats.cov_xy, 0.0);
        assert!((stats.ssim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn self_comparison_of_textured_block_is_one() {
        let x = LumaImage::from_fn(8, 8, |x, y| ((x * 7 + y * 13) % 17) as f32 / 16.0);
        let stats = BlockStats::compute(&x, &x, full(8), unit());
        assert!(stats.var_x > 0.0);
        assert!((stats.cov_xy - stats.var_x).abs() < 1e-6);
        assert!((stats.ssim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn population_variance_divides_by_n() {
        // Samples 0 and 1 alternating: mean 0.5, population variance 0.25.
        let x = LumaImage::from_fn(2, 1, |x, _| x as f32);
        let region = BlockRegion {
            x0: 0,
            y0: 0,
            x1: 2,
            y1: 1,
        };
        let stats = BlockStats::compute(&x, &x, region, unit());
        assert_eq!(stats.mean_x, 0.5);
        assert_eq!(stats.var_x, 0.25);
    }

    #[test]
    fn additive_shift_keeps_moments_but_lowers_ssim() {
        let x = LumaImage::from_fn(8, 8, |x, y| ((x + y) % 4) as f32 * 0.1);
        let y = x.map(|s| s + 0.3);
        let stats = BlockStats::compute(&x, &y, full(8), unit());
        assert!((stats.var_x - stats.var_y).abs() < 1e-6);
        assert!((stats.cov_xy - stats.var_x).abs() < 1e-6);
        assert!((stats.mean_y - stats.mean_x - 0.3).abs() < 1e-5);
        assert!(stats.ssim < 1.0);
    }

    #[test]
    fn clipped_region_only_reads_inside() {
        // 10x8 image, second block spans x in [8, 10).
        let x = LumaImage::from_fn(10, 8, |x, _| if x >= 8 { 0.75 } else { 0.0 });
        let region = BlockRegion {
            x0: 8,
            y0: 0,
            x1: 10,
            y1: 8,
        };
        let stats = BlockStats::compute(&x, &x, region, unit());
        assert_eq!(stats.mean_x, 0.75);
        assert_eq!(stats.var_x, 0.0);
    }

    #[test]
    fn zero_constants_on_black_block_is_degenerate() {
        let x = LumaImage::filled(4, 4, 0.0);
        let stats = BlockStats::compute(
            &x,
            &x,
            full(4),
            StabilizingConstants::from_dynamic_range(0.0),
        );
        assert!(stats.ssim.is_nan());
        assert!(stats.is_degenerate());
    }
}
