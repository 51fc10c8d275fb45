//! nonsteady: drop leading non-steady-state frames from a series and its
//! confound table.
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use boldclean::{drop_nonsteady, io::SeriesImage, ConfoundTable};

#[derive(Parser, Debug)]
#[command(name = "nonsteady", about = "Remove non-steady-state volumes")]
struct Args {
    /// Input series container.
    #[arg(long)]
    input: PathBuf,

    /// Confound table (TSV) with `non_steady_state*` columns.
    #[arg(long)]
    table: PathBuf,

    /// Output series container.
    #[arg(long)]
    output: PathBuf,

    /// Output confound table.
    #[arg(long)]
    output_table: PathBuf,

    /// Brain mask for volumes.
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let img = SeriesImage::load(&args.input, args.mask.as_deref())?;
    let table = ConfoundTable::load(&args.table)?;

    let (series, table) = drop_nonsteady(&img.data, &table)?;
    let trimmed = img.with_data(series)?;

    table.write(&args.output_table)?;
    if let Err(err) = trimmed.save(&args.output) {
        let _ = std::fs::remove_file(&args.output_table);
        return Err(err);
    }
    tracing::info!(
        "written {} and {}",
        args.output.display(),
        args.output_table.display()
    );
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}
