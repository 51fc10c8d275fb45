//! set_tr: rewrite a series container with a new repetition time.
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use boldclean::io::SeriesImage;

#[derive(Parser, Debug)]
#[command(name = "set_tr", about = "Set the repetition time of a series")]
struct Args {
    /// Input series container.
    #[arg(long)]
    input: PathBuf,

    /// Output series container.
    #[arg(long)]
    output: PathBuf,

    /// Repetition time in seconds.
    #[arg(long)]
    tr: f64,

    /// Debug-level logging.
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut img = SeriesImage::load(&args.input, None)?;
    img.set_repetition_time(args.tr)?;
    img.save(&args.output)?;
    tracing::info!(tr = args.tr, "written {}", args.output.display());
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}
