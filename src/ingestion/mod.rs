//! File loading entrypoints and implementations.
//!
//! - [`load_directory`] (from [`directory`]) lists a directory, filters by name pattern and
//!   [`FileKindSelector`], and loads every match
//! - [`load_file`] (from [`unified`]) loads a single file, dispatching on its [`FileKind`]
//! - [`observability`] holds the [`PipelineObserver`] hooks used to report progress
//!
//! Format-specific loaders live under [`csv`] and (with the `excel` feature) `excel`.

pub mod csv;
pub mod directory;
#[cfg(feature = "excel")]
pub mod excel;
pub mod observability;
pub mod unified;

pub use directory::{load_directory, matching_files, DirectoryOptions};
pub use observability::{
    CompositeObserver, FileObserver, PipelineObserver, Severity, SourceStats, StageReport, TracingObserver,
};
pub use unified::{load_file, FileKind, FileKindSelector, LoadedTable, SheetSelection, SourceContext};
