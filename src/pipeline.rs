//! The merge pipeline: load a directory, merge, clean, transform, write.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::PipelineResult;
use crate::ingestion::{
    load_directory, DirectoryOptions, FileKindSelector, PipelineObserver, Severity, StageReport,
};
use crate::processing::{clean, merge_tables, run_transforms, Transform, TransformContext};
use crate::writer::write_table;

/// Options for [`merge_directory`].
#[derive(Clone)]
pub struct MergeOptions {
    /// Directory whose files are merged (not recursive).
    pub input_dir: PathBuf,
    /// Output file; `.xlsx` writes a workbook, anything else CSV.
    pub output_path: PathBuf,
    /// Optional case-insensitive file name glob.
    pub pattern: Option<String>,
    /// File kinds to load.
    pub kinds: FileKindSelector,
    /// Transforms applied after cleaning, in order.
    pub transforms: Vec<Transform>,
    /// Skip the fixed cleaning sequence.
    pub skip_cleaning: bool,
    /// Optional observer for progress, failures and alerts.
    pub observer: Option<Arc<dyn PipelineObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: Severity,
    /// Clock for relative transforms.
    pub context: TransformContext,
}

impl MergeOptions {
    /// Options with defaults: every supported kind, no pattern, cleaning on, no transforms.
    pub fn new(input_dir: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_path: output_path.into(),
            pattern: None,
            kinds: FileKindSelector::Both,
            transforms: Vec::new(),
            skip_cleaning: false,
            observer: None,
            alert_at_or_above: Severity::Critical,
            context: TransformContext::now(),
        }
    }
}

impl fmt::Debug for MergeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeOptions")
            .field("input_dir", &self.input_dir)
            .field("output_path", &self.output_path)
            .field("pattern", &self.pattern)
            .field("kinds", &self.kinds)
            .field("transforms", &self.transforms)
            .field("skip_cleaning", &self.skip_cleaning)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

/// Outcome of a successful merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    /// Number of loaded tables (files, or sheets for workbooks).
    pub sources: usize,
    /// Sum of source row counts.
    pub source_rows: usize,
    /// Rows in the written output.
    pub rows_written: usize,
    /// Columns in the written output.
    pub columns_written: usize,
    /// Where the output was written.
    pub output_path: PathBuf,
}

/// Merge every matching file under `options.input_dir` into `options.output_path`.
///
/// Any failure aborts the run before the output is written. When an observer is configured this
/// reports:
///
/// - `on_source_loaded` per loaded table
/// - `on_stage` for the merge, each cleaning step and each transform
/// - `on_failure` on error, plus `on_alert` when the severity is >= `options.alert_at_or_above`
pub fn merge_directory(options: &MergeOptions) -> PipelineResult<MergeSummary> {
    let result = run(options);

    if let (Some(obs), Err(e)) = (options.observer.as_ref(), &result) {
        let sev = Severity::for_error(e);
        obs.on_failure(sev, e);
        if sev >= options.alert_at_or_above {
            obs.on_alert(sev, e);
        }
    }

    result
}

fn run(options: &MergeOptions) -> PipelineResult<MergeSummary> {
    let observer = options.observer.as_deref();
    let report = |r: &StageReport| {
        if let Some(obs) = observer {
            obs.on_stage(r);
        }
    };

    let dir_options = DirectoryOptions {
        pattern: options.pattern.clone(),
        kinds: options.kinds,
    };
    let loaded = load_directory(&options.input_dir, &dir_options, observer)?;
    let source_rows: usize = loaded.iter().map(|t| t.table.row_count()).sum();

    let merged = merge_tables(loaded.iter().map(|t| &t.table));
    report(&StageReport {
        stage: "merge".to_string(),
        rows_before: source_rows,
        rows_after: merged.row_count(),
        columns_before: loaded.iter().map(|t| t.table.column_count()).sum(),
        columns_after: merged.column_count(),
    });

    let table = if options.skip_cleaning {
        merged
    } else {
        let (cleaned, reports) = clean(merged);
        reports.iter().for_each(report);
        cleaned
    };

    let table = run_transforms(table, &options.transforms, &options.context, observer)?;

    write_table(&table, &options.output_path)?;
    tracing::debug!(output = %options.output_path.display(), rows = table.row_count(), "merge output written");

    Ok(MergeSummary {
        sources: loaded.len(),
        source_rows,
        rows_written: table.row_count(),
        columns_written: table.column_count(),
        output_path: options.output_path.clone(),
    })
}
