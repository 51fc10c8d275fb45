//! interpolate: replace censored frames of a series by Lomb–Scargle
//! spectral interpolation.
//!
//! Seen frames are written unchanged.  A temporal mask without censored
//! frames copies the input through with a warning.
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use boldclean::{interpolate, io::SeriesImage, DenoiseError, SamplingGrid, TemporalMask};

#[derive(Parser, Debug)]
#[command(name = "interpolate", about = "Spectral interpolation of censored fMRI frames")]
struct Args {
    /// Input series container (`*.nii.gz|.func.gii|.dtseries.nii.safetensors`).
    #[arg(long)]
    input: PathBuf,

    /// Temporal mask: one 0/1 flag per frame, 1 = seen.
    #[arg(long)]
    tmask: PathBuf,

    /// Output series container.
    #[arg(long)]
    output: PathBuf,

    /// Brain mask for volumes (`[X, Y, Z]` container).
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Repetition time in seconds (default: the TR stored with the input).
    #[arg(long)]
    tr: Option<f64>,

    /// Oversampling factor of the frequency grid.
    #[arg(long, default_value_t = 8.0)]
    ofreq: f64,

    /// Highest fitted frequency as a fraction of Nyquist.
    #[arg(long, default_value_t = 1.0)]
    hifrac: f64,

    /// Spatial units reconstructed per batch.
    #[arg(long, default_value_t = 3000)]
    batch_size: usize,

    /// JSON sampling grid; overrides the flags above.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let img = SeriesImage::load(&args.input, args.mask.as_deref())?;
    let tmask = TemporalMask::load(&args.tmask)?;

    let mut grid = match &args.config {
        Some(path) => SamplingGrid::from_json_file(path)?,
        None => SamplingGrid {
            oversampling_frequency: args.ofreq,
            highpass_fraction: args.hifrac,
            voxel_batch_size: args.batch_size,
            ..SamplingGrid::default()
        },
    };
    if let Some(tr) = args.tr.or(img.repetition_time()) {
        if grid.tr <= 0.0 || args.tr.is_some() {
            grid.tr = tr;
        }
    }

    tracing::info!(
        units = img.n_units(),
        frames = img.n_timepoints(),
        censored = tmask.n_censored(),
        tr = grid.tr,
        "interpolating {}",
        args.input.display()
    );

    let out = match interpolate(&img.data, &tmask, &grid) {
        Ok(filled) => img.with_data(filled)?,
        Err(DenoiseError::NothingToInterpolate) => {
            tracing::warn!("no censored frames; writing the input unchanged");
            img
        }
        Err(e) => return Err(e).context("interpolation failed"),
    };
    out.save(&args.output)?;
    tracing::info!("written {}", args.output.display());
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}
