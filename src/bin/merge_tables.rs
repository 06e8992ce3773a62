use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use crm_data_sync::ingestion::{CompositeObserver, FileKindSelector, FileObserver, PipelineObserver, TracingObserver};
use crm_data_sync::logging::init_tracing;
use crm_data_sync::pipeline::{merge_directory, MergeOptions};
use crm_data_sync::processing::Transform;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Delimited,
    Spreadsheet,
    Both,
}

impl From<Kind> for FileKindSelector {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Delimited => FileKindSelector::Delimited,
            Kind::Spreadsheet => FileKindSelector::Spreadsheet,
            Kind::Both => FileKindSelector::Both,
        }
    }
}

/// Merge every CSV/spreadsheet in a directory into one cleaned table
#[derive(Parser, Debug)]
#[command(name = "merge_tables", version, about, long_about = None)]
struct Cli {
    /// Directory holding the exports (not searched recursively)
    input_dir: PathBuf,

    /// Output file; `.xlsx` writes a workbook, anything else CSV
    output: PathBuf,

    /// Case-insensitive file name glob, e.g. `contacts_*`
    #[arg(long)]
    pattern: Option<String>,

    /// Which file kinds to load
    #[arg(long, value_enum, default_value_t = Kind::Both)]
    kind: Kind,

    /// Transform applied after cleaning; repeat to chain (recent[:days], no-test-data,
    /// where:<col><op><value>, dedupe:<cols>, min-non-null:<n>)
    #[arg(long = "transform", value_name = "SPEC")]
    transforms: Vec<Transform>,

    /// Skip the built-in cleaning steps
    #[arg(long)]
    skip_clean: bool,

    /// Also append pipeline events to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    init_tracing("info");
    let cli = Cli::parse();

    let mut observers: Vec<Arc<dyn PipelineObserver>> = vec![Arc::new(TracingObserver)];
    if let Some(path) = &cli.log_file {
        observers.push(Arc::new(FileObserver::new(path)));
    }

    let mut options = MergeOptions::new(&cli.input_dir, &cli.output);
    options.pattern = cli.pattern;
    options.kinds = cli.kind.into();
    options.transforms = cli.transforms;
    options.skip_cleaning = cli.skip_clean;
    options.observer = Some(Arc::new(CompositeObserver::new(observers)));

    match merge_directory(&options) {
        Ok(summary) => {
            println!(
                "Saved {} rows ({} columns) to {}",
                summary.rows_written,
                summary.columns_written,
                summary.output_path.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
