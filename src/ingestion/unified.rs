//! Unified single-file loading.
//!
//! [`load_file`] resolves a file's [`FileKind`] once from its extension and dispatches to the CSV
//! or spreadsheet loader; both return the common [`crate::types::Table`] type.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{IngestionError, IngestionResult};
use crate::types::Table;

use super::csv;

/// Kinds of tabular files the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Comma-separated values.
    Delimited,
    /// Spreadsheet/workbook formats (feature-gated behind `excel`).
    Spreadsheet,
}

impl FileKind {
    /// Parse a file kind from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Delimited),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Spreadsheet),
            _ => None,
        }
    }

    /// Resolve the file kind of `path` from its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|s| s.to_str())
            .and_then(Self::from_extension)
    }
}

/// Which file kinds a directory load should pick up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileKindSelector {
    /// Only delimited files.
    Delimited,
    /// Only spreadsheets.
    Spreadsheet,
    /// Both kinds.
    #[default]
    Both,
}

impl FileKindSelector {
    /// `true` if files of `kind` are selected.
    pub fn accepts(self, kind: FileKind) -> bool {
        matches!(
            (self, kind),
            (Self::Both, _) | (Self::Delimited, FileKind::Delimited) | (Self::Spreadsheet, FileKind::Spreadsheet)
        )
    }
}

/// How to choose sheet(s) when loading a workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SheetSelection {
    /// Load the first sheet that has a header row.
    First,
    /// Load every non-empty sheet, one table each (default).
    #[default]
    AllSheets,
}

/// Where a loaded table came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContext {
    /// Input file.
    pub path: PathBuf,
    /// Resolved file kind.
    pub kind: FileKind,
    /// Worksheet name for spreadsheets.
    pub sheet: Option<String>,
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sheet {
            Some(sheet) => write!(f, "{}[{sheet}]", self.path.display()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// A table together with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTable {
    /// Origin of the table.
    pub source: SourceContext,
    /// Table contents.
    pub table: Table,
}

/// Load one file into one table (delimited) or one table per non-empty sheet (spreadsheet).
///
/// Fails with [`IngestionError::UnsupportedFormat`] if the extension maps to no [`FileKind`].
///
/// ```no_run
/// use crm_data_sync::ingestion::{load_file, SheetSelection};
///
/// # fn main() -> Result<(), crm_data_sync::IngestionError> {
/// for loaded in load_file("contacts.xlsx", SheetSelection::AllSheets)? {
///     println!("{}: rows={}", loaded.source, loaded.table.row_count());
/// }
/// # Ok(())
/// # }
/// ```
pub fn load_file(path: impl AsRef<Path>, sheets: SheetSelection) -> IngestionResult<Vec<LoadedTable>> {
    let path = path.as_ref();
    let kind = FileKind::from_path(path).ok_or_else(|| IngestionError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;

    match kind {
        FileKind::Delimited => {
            let table = csv::load_csv_from_path(path)?;
            Ok(vec![LoadedTable {
                source: SourceContext {
                    path: path.to_path_buf(),
                    kind,
                    sheet: None,
                },
                table,
            }])
        }
        FileKind::Spreadsheet => load_spreadsheet_dispatch(path, sheets),
    }
}

fn load_spreadsheet_dispatch(path: &Path, sheets: SheetSelection) -> IngestionResult<Vec<LoadedTable>> {
    // Avoid unused warnings when the feature is off.
    let _ = (path, sheets);

    #[cfg(feature = "excel")]
    {
        use super::excel;

        let first_only = sheets == SheetSelection::First;
        Ok(excel::load_workbook_from_path(path, first_only)?
            .into_iter()
            .map(|s| LoadedTable {
                source: SourceContext {
                    path: path.to_path_buf(),
                    kind: FileKind::Spreadsheet,
                    sheet: Some(s.sheet),
                },
                table: s.table,
            })
            .collect())
    }

    #[cfg(not(feature = "excel"))]
    {
        Err(IngestionError::ExcelDisabled)
    }
}
