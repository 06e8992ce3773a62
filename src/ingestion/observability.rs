//! Pipeline progress reporting: stage reports, failure severities and the observers that record them.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::error::{IngestionError, PipelineError, WriteError};

use super::unified::SourceContext;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (operation failed).
    Error,
    /// Critical error (typically I/O or other infrastructure failures).
    Critical,
}

impl Severity {
    /// Classify a pipeline failure. I/O problems are critical, everything else is an error.
    pub fn for_error(e: &PipelineError) -> Self {
        match e {
            PipelineError::Ingestion(IngestionError::Io(_) | IngestionError::Walk(_)) => Severity::Critical,
            PipelineError::Ingestion(IngestionError::Csv(err)) => match err.kind() {
                ::csv::ErrorKind::Io(_) => Severity::Critical,
                _ => Severity::Error,
            },
            PipelineError::Write(WriteError::Io(_)) => Severity::Critical,
            _ => Severity::Error,
        }
    }
}

/// Row/column counts of one table after loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStats {
    /// Number of loaded rows.
    pub rows: usize,
    /// Number of loaded columns.
    pub columns: usize,
}

/// Shape change reported by one pipeline stage (merge, a cleaning step, or a transform).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    /// Stage name, e.g. `drop_duplicates` or a transform spec.
    pub stage: String,
    /// Rows before the stage.
    pub rows_before: usize,
    /// Rows after the stage.
    pub rows_after: usize,
    /// Columns before the stage.
    pub columns_before: usize,
    /// Columns after the stage.
    pub columns_after: usize,
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: rows {} -> {}, columns {} -> {}",
            self.stage, self.rows_before, self.rows_after, self.columns_before, self.columns_after
        )
    }
}

/// Observer interface for merge pipeline progress and outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait PipelineObserver: Send + Sync {
    /// Called after each file (or sheet) is loaded.
    fn on_source_loaded(&self, _source: &SourceContext, _stats: SourceStats) {}

    /// Called after each stage that reshapes the table.
    fn on_stage(&self, _report: &StageReport) {}

    /// Called when the pipeline fails.
    fn on_failure(&self, _severity: Severity, _error: &PipelineError) {}

    /// Called when a failure meets an alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, severity: Severity, error: &PipelineError) {
        self.on_failure(severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn PipelineObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl PipelineObserver for CompositeObserver {
    fn on_source_loaded(&self, source: &SourceContext, stats: SourceStats) {
        for o in &self.observers {
            o.on_source_loaded(source, stats);
        }
    }

    fn on_stage(&self, report: &StageReport) {
        for o in &self.observers {
            o.on_stage(report);
        }
    }

    fn on_failure(&self, severity: Severity, error: &PipelineError) {
        for o in &self.observers {
            o.on_failure(severity, error);
        }
    }

    fn on_alert(&self, severity: Severity, error: &PipelineError) {
        for o in &self.observers {
            o.on_alert(severity, error);
        }
    }
}

/// Emits pipeline events as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_source_loaded(&self, source: &SourceContext, stats: SourceStats) {
        tracing::info!(source = %source, rows = stats.rows, columns = stats.columns, "loaded");
    }

    fn on_stage(&self, report: &StageReport) {
        tracing::info!(
            stage = %report.stage,
            rows_before = report.rows_before,
            rows_after = report.rows_after,
            columns_before = report.columns_before,
            columns_after = report.columns_after,
            "stage finished"
        );
    }

    fn on_failure(&self, severity: Severity, error: &PipelineError) {
        tracing::error!(severity = ?severity, error = %error, "pipeline failed");
    }

    fn on_alert(&self, severity: Severity, error: &PipelineError) {
        tracing::error!(severity = ?severity, error = %error, alert = true, "pipeline failed");
    }
}

/// Appends pipeline events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{} {line}", Utc::now().to_rfc3339());
        }
    }
}

impl PipelineObserver for FileObserver {
    fn on_source_loaded(&self, source: &SourceContext, stats: SourceStats) {
        self.append_line(&format!(
            "loaded source={source} rows={} columns={}",
            stats.rows, stats.columns
        ));
    }

    fn on_stage(&self, report: &StageReport) {
        self.append_line(&format!("stage {report}"));
    }

    fn on_failure(&self, severity: Severity, error: &PipelineError) {
        self.append_line(&format!("fail severity={severity:?} err={error}"));
    }

    fn on_alert(&self, severity: Severity, error: &PipelineError) {
        self.append_line(&format!("ALERT severity={severity:?} err={error}"));
    }
}
