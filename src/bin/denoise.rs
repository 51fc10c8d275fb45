//! denoise: detrend, band-pass filter and regress a series, writing the
//! cleaned series and a DVARS QC sidecar.
use anyhow::{bail, Result};
use clap::Parser;
use ndarray::Array2;
use std::path::PathBuf;

use boldclean::{
    confounds::{read_confound_matrix, read_vector},
    io::{write_qc, SeriesImage},
    DenoiseConfig, DenoisePipeline, ProcessOrder,
};

#[derive(Parser, Debug)]
#[command(name = "denoise", about = "Detrend / filter / regress an fMRI series")]
struct Args {
    /// Input series container.
    #[arg(long)]
    input: PathBuf,

    /// Output series container.
    #[arg(long)]
    output: PathBuf,

    /// Confound matrix, whitespace-separated, one frame per line.
    #[arg(long)]
    confounds: Option<PathBuf>,

    /// Brain mask for volumes.
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Repetition time in seconds (default: the TR stored with the input).
    #[arg(long)]
    tr: Option<f64>,

    /// Upper band edge in Hz.
    #[arg(long, default_value_t = 0.08)]
    lowpass: f64,

    /// Lower band edge in Hz.
    #[arg(long, default_value_t = 0.01)]
    highpass: f64,

    /// Butterworth prototype order.
    #[arg(long, default_value_t = 2)]
    filter_order: usize,

    /// Polynomial detrend order.
    #[arg(long, default_value_t = 1)]
    detrend_order: usize,

    /// Stage order, e.g. DMT-TMP-REG or DMT-REG-TMP.
    #[arg(long, default_value = "DMT-TMP-REG")]
    process_order: ProcessOrder,

    /// JSON pipeline configuration; overrides the flags above.
    #[arg(long)]
    config: Option<PathBuf>,

    /// QC sidecar (DVARS before / after, FD).
    #[arg(long)]
    qc: Option<PathBuf>,

    /// Framewise displacement trace copied into the QC sidecar.
    #[arg(long)]
    fd: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let img = SeriesImage::load(&args.input, args.mask.as_deref())?;

    let mut cfg = match &args.config {
        Some(path) => DenoiseConfig::from_json_file(path)?,
        None => DenoiseConfig {
            lowpass: args.lowpass,
            highpass: args.highpass,
            filter_order: args.filter_order,
            detrend_order: args.detrend_order,
            process_order: args.process_order.clone(),
            ..DenoiseConfig::default()
        },
    };
    if let Some(tr) = args.tr.or(img.repetition_time()) {
        if cfg.tr <= 0.0 || args.tr.is_some() {
            cfg.tr = tr;
        }
    }

    let confounds = match &args.confounds {
        Some(path) => read_confound_matrix(path)?,
        None => Array2::zeros((0, img.n_timepoints())),
    };
    let fd = match &args.fd {
        Some(path) => {
            let fd = read_vector(path)?;
            if fd.len() != img.n_timepoints() {
                bail!(
                    "FD trace has {} values, series has {} frames",
                    fd.len(),
                    img.n_timepoints()
                );
            }
            Some(fd)
        }
        None => None,
    };

    let pipeline = DenoisePipeline::new(cfg)?;
    let out = pipeline.run(&img.data, &confounds)?;
    let cleaned = img.with_data(out.cleaned)?;

    cleaned.save(&args.output)?;
    if let Some(qc) = &args.qc {
        if let Err(err) = write_qc(qc, &out.dvars_pre, &out.dvars_post, fd.as_deref()) {
            let _ = std::fs::remove_file(&args.output);
            return Err(err);
        }
        tracing::info!("QC written {}", qc.display());
    }
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
