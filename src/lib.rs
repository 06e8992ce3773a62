//! `crm-data-sync` merges CRM exports into one cleaned table, uploads tables into a keyed remote
//! store (DynamoDB), and serves the stored records over a small authenticated HTTP API.
//!
//! The three entry points match the three binaries:
//!
//! - [`pipeline::merge_directory`] (`merge_tables`): load every CSV/spreadsheet in a directory,
//!   merge them over the union of their columns, clean, transform, write CSV or `.xlsx`
//! - [`upload::Uploader`] (`upload_table`): load one file, validate the key column, create the
//!   remote table on first use, write rows in batches
//! - [`api`] (`crm_api`): `GET /api/crm/data` and `GET /api/crm/data/{key}` behind a bearer token
//!
//! ## What you can load
//!
//! - **CSV**: `.csv`
//! - **Spreadsheets** (Cargo feature `excel`, on by default): `.xlsx`, `.xls`, `.xlsm`, `.xlsb`,
//!   `.ods`; every non-empty sheet is a source when merging, only the first when uploading
//!
//! Column types are inferred from the data ([`types::DataType`]): `Int64`, `Float64`, `Bool` or
//! `Utf8`. Empty cells are [`types::Value::Null`].
//!
//! ## Quick example: merge a directory
//!
//! ```no_run
//! use crm_data_sync::pipeline::{merge_directory, MergeOptions};
//!
//! # fn main() -> Result<(), crm_data_sync::PipelineError> {
//! let mut options = MergeOptions::new("exports/", "merged.csv");
//! options.pattern = Some("contacts_*".to_string());
//! options.transforms = vec!["no-test-data".parse()?, "recent:90".parse()?];
//! let summary = merge_directory(&options)?;
//! println!("rows={}", summary.rows_written);
//! # Ok(())
//! # }
//! ```
//!
//! ## Quick example: upload
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use crm_data_sync::store::InMemoryStore;
//! use crm_data_sync::upload::Uploader;
//!
//! # async fn run() -> Result<(), crm_data_sync::UploadError> {
//! let store = Arc::new(InMemoryStore::new());
//! let summary = Uploader::new(store, "crm_contacts", "EmailId")
//!     .upload_file("merged.csv")
//!     .await?;
//! println!("uploaded={} skipped={}", summary.uploaded, summary.skipped);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: directory listing, CSV/spreadsheet loaders, pipeline observers
//! - [`processing`]: merge, cleaning, filters and transforms
//! - [`writer`]: CSV / `.xlsx` output
//! - [`pipeline`]: the merge pipeline
//! - [`store`]: the [`store::KeyValueStore`] seam with DynamoDB and in-memory implementations
//! - [`upload`]: the uploader
//! - [`api`]: the read API
//! - [`config`]: file + environment configuration and secrets
//! - [`logging`]: `tracing-subscriber` setup for the binaries
//! - [`types`], [`error`]: data model and error types

pub mod api;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod logging;
pub mod pipeline;
pub mod processing;
pub mod store;
pub mod types;
pub mod upload;
pub mod writer;

pub use error::{
    ConfigError, IngestionError, IngestionResult, PipelineError, PipelineResult, StoreError, TransformError,
    UploadError, WriteError,
};
