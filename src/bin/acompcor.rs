//! acompcor: extract the leading retained CSF and WM aCompCor components
//! from an fMRIPrep confound table.
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use boldclean::{confounds::write_confound_matrix, select_acompcor, ConfoundTable};

#[derive(Parser, Debug)]
#[command(name = "acompcor", about = "aCompCor component selection")]
struct Args {
    /// Confound table (TSV).
    #[arg(long)]
    confounds: PathBuf,

    /// Confound metadata (JSON sidecar of the table).
    #[arg(long)]
    metadata: PathBuf,

    /// Output matrix, one frame per line.
    #[arg(long)]
    output: PathBuf,

    /// Components per tissue mask.
    #[arg(long, default_value_t = 5)]
    n_components: usize,

    /// Debug-level logging.
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let table = ConfoundTable::load(&args.confounds)?;
    let text = std::fs::read_to_string(&args.metadata)
        .with_context(|| format!("reading {}", args.metadata.display()))?;
    let metadata: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", args.metadata.display()))?;

    let (matrix, names) = select_acompcor(&table, &metadata, args.n_components)?;
    tracing::info!("selected {}", names.join(", "));
    write_confound_matrix(&args.output, &matrix)?;
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}
