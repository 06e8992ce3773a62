//! Directory loading: list, filter by name pattern and file kind, load every match.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::error::{IngestionError, IngestionResult};

use super::observability::{PipelineObserver, SourceStats};
use super::unified::{load_file, FileKind, FileKindSelector, LoadedTable, SheetSelection};

const NAME_MATCH: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Options for [`load_directory`].
#[derive(Debug, Clone, Default)]
pub struct DirectoryOptions {
    /// Optional case-insensitive glob matched against file names (e.g. `contacts_*.csv`).
    pub pattern: Option<String>,
    /// File kinds to load.
    pub kinds: FileKindSelector,
}

/// List the regular files directly inside `dir` that match `options`, in file-name order.
pub fn matching_files(dir: &Path, options: &DirectoryOptions) -> IngestionResult<Vec<(PathBuf, FileKind)>> {
    let pattern = options.pattern.as_deref().map(Pattern::new).transpose()?;

    let mut out = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if let Some(p) = &pattern {
            if !p.matches_with(&name, NAME_MATCH) {
                continue;
            }
        }
        match FileKind::from_path(entry.path()) {
            Some(kind) if options.kinds.accepts(kind) => out.push((entry.into_path(), kind)),
            _ => {}
        }
    }
    Ok(out)
}

/// Load every matching file in `dir`.
///
/// Delimited files yield one table each, spreadsheets one table per non-empty sheet. Tables come
/// back in file-name order, sheets in workbook order. Fails with
/// [`IngestionError::NoMatchingFiles`] if nothing was loaded.
pub fn load_directory(
    dir: impl AsRef<Path>,
    options: &DirectoryOptions,
    observer: Option<&dyn PipelineObserver>,
) -> IngestionResult<Vec<LoadedTable>> {
    let dir = dir.as_ref();
    let mut loaded = Vec::new();
    for (path, _kind) in matching_files(dir, options)? {
        for table in load_file(&path, SheetSelection::AllSheets)? {
            if let Some(obs) = observer {
                obs.on_source_loaded(
                    &table.source,
                    SourceStats {
                        rows: table.table.row_count(),
                        columns: table.table.column_count(),
                    },
                );
            }
            loaded.push(table);
        }
    }

    if loaded.is_empty() {
        return Err(IngestionError::NoMatchingFiles {
            dir: dir.to_path_buf(),
            pattern: options.pattern.clone(),
        });
    }
    Ok(loaded)
}
