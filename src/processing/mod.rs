//! In-memory table processing.
//!
//! - [`merge_tables`]: concatenate loaded tables over the union of their columns
//! - [`clean()`]: the fixed cleaning sequence (empty rows/columns, duplicates, sparse rows, text)
//! - [`Transform`] / [`run_transforms`]: named, ordered, configurable transforms
//!
//! ## Example: merge → clean → transform
//!
//! ```rust
//! use crm_data_sync::processing::{clean, merge_tables, run_transforms, Transform, TransformContext};
//! use crm_data_sync::types::{Table, Value};
//!
//! let a = Table::from_cells(
//!     vec!["id".to_string(), "name".to_string()],
//!     vec![
//!         vec![Value::Int64(1), Value::Utf8("Ada".to_string())],
//!         vec![Value::Int64(2), Value::Utf8("test user".to_string())],
//!     ],
//! );
//! let b = Table::from_cells(
//!     vec!["id".to_string(), "email".to_string()],
//!     vec![vec![Value::Int64(1), Value::Utf8(" ada@x.io ".to_string())]],
//! );
//!
//! let merged = merge_tables([&a, &b]);
//! let (cleaned, _reports) = clean(merged);
//! let transforms: Vec<Transform> = vec!["no-test-data".parse().unwrap()];
//! let out = run_transforms(cleaned, &transforms, &TransformContext::now(), None).unwrap();
//!
//! assert_eq!(out.row_count(), 2);
//! assert_eq!(out.rows[1][2], Value::Utf8("ada@x.io".to_string()));
//! ```

pub mod clean;
pub mod filter;
pub mod merge;
pub mod transform;

pub use clean::clean;
pub use filter::{CompareOp, Filter};
pub use merge::merge_tables;
pub use transform::{run_transforms, Transform, TransformContext};
