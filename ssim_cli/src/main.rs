use anyhow::{Context, Result};
use block_ssim::core_modules::backend::SequentialBackend;
use block_ssim::core_modules::image_loader::load_luma;
use block_ssim::core_modules::luma::{LumaImage, PixelSource};
use block_ssim::{SimilarityReport, SsimConfig, SsimPipeline};
use clap::Parser;
use log::debug;
use std::path::PathBuf;
use std::process::ExitCode;

/// Block-wise SSIM between two images.
///
/// Both images are converted to luma in [0, 1], cut into square blocks, and
/// the per-block SSIM values are averaged. 1.0 means identical.
#[derive(Parser, Debug)]
#[command(name = "ssim", version, about)]
#[command(after_help = "EXIT CODES:
    0 - Success (score at or above --min-score if given)
    1 - Score below --min-score
    2 - Error (file not found, size mismatch, invalid option)")]
struct Cli {
    /// Reference image
    #[arg(value_name = "REFERENCE")]
    reference: PathBuf,

    /// Image to compare against the reference
    #[arg(value_name = "DISTORTED")]
    distorted: PathBuf,

    /// Side of a square block in pixels
    #[arg(long, short = 'b', default_value_t = 8)]
    block_size: u32,

    /// Dynamic range L of a sample (samples are normalized, so 1.0)
    #[arg(long, default_value_t = 1.0)]
    dynamic_range: f32,

    /// Worker threads for the parallel backend (default: one per CPU)
    #[arg(long, short = 'j', conflicts_with = "sequential")]
    workers: Option<usize>,

    /// Compute on the calling thread instead of a worker pool
    #[arg(long)]
    sequential: bool,

    /// Print the statistics of every block
    #[arg(long)]
    blocks: bool,

    /// Minimum acceptable score (exit code 1 if the score is lower)
    #[arg(long, value_name = "SCORE")]
    min_score: Option<f32>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(report) => {
            println!("SSIM: {}", report.score);
            match cli.min_score {
                Some(min) if report.score.is_nan() || report.score < min => {
                    eprintln!("score {} is below the minimum {}", report.score, min);
                    ExitCode::from(1)
                }
                _ => ExitCode::SUCCESS,
            }
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(cli: &Cli) -> Result<SimilarityReport> {
    // --- 1. Decode ---
    let reference = load_luma(&cli.reference)
        .with_context(|| format!("cannot read image {}", cli.reference.display()))?;
    let distorted = load_luma(&cli.distorted)
        .with_context(|| format!("cannot read image {}", cli.distorted.display()))?;
    debug!("width: {}, height: {}", reference.width(), reference.height());

    // --- 2. Configure & Compare ---
    let config = SsimConfig {
        block_size: cli.block_size,
        dynamic_range: cli.dynamic_range,
        workers: cli.workers,
    };
    let report = compare(config, cli.sequential, &reference, &distorted)?;

    // --- 3. Per-block output ---
    if cli.blocks {
        print_blocks(&report);
    }

    Ok(report)
}

fn compare(
    config: SsimConfig,
    sequential: bool,
    reference: &LumaImage,
    distorted: &LumaImage,
) -> Result<SimilarityReport> {
    let report = if sequential {
        SsimPipeline::new(config, SequentialBackend)?.compare(reference, distorted)?
    } else {
        SsimPipeline::with_worker_pool(config)?.compare(reference, distorted)?
    };
    Ok(report)
}

fn print_blocks(report: &SimilarityReport) {
    println!("block\tmean_x\tmean_y\tvar_x\tvar_y\tcov_xy\tssim");
    for ((bx, by), block) in report.iter_blocks() {
        println!(
            "({bx},{by})\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}",
            block.mean_x, block.mean_y, block.var_x, block.var_y, block.cov_xy, block.ssim
        );
    }
}
