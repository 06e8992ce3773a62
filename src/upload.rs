//! Upload a table file into a remote keyed table.
//!
//! One invocation walks these stages in order:
//!
//! 1. `start`: verify the store is reachable, load the file (first sheet of a workbook), apply the
//!    configured transforms
//! 2. `validated`: the key column is present
//! 3. `table_ready`: the remote table exists, creating it (and waiting for it) if needed
//! 4. `uploading`: rows are coerced and written in batches
//! 5. `done`
//!
//! A failure at any stage is logged with the stage name and returned.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{UploadError, UploadResult};
use crate::ingestion::{load_file, SheetSelection};
use crate::processing::{run_transforms, Transform, TransformContext};
use crate::store::{Item, KeySchema, KeyType, KeyValueStore, StoreValue};
use crate::types::{Schema, Table, Value};

/// Most items a single batch write may carry.
pub const BATCH_LIMIT: usize = 25;

/// Uploader progress, used in log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    /// Connecting, loading and transforming.
    Start,
    /// Key column checked.
    Validated,
    /// Remote table exists and is active.
    TableReady,
    /// Writing batches.
    Uploading,
    /// Finished.
    Done,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UploadStage::Start => "start",
            UploadStage::Validated => "validated",
            UploadStage::TableReady => "table_ready",
            UploadStage::Uploading => "uploading",
            UploadStage::Done => "done",
        })
    }
}

/// Counts reported by a finished upload. `uploaded == loaded - skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    /// Rows offered for upload (after transforms).
    pub loaded: usize,
    /// Rows written.
    pub uploaded: usize,
    /// Rows skipped for a missing key, or a key that cannot take the table's key type.
    pub skipped: usize,
    /// Whether this run created the remote table.
    pub table_created: bool,
}

/// Uploads tables into one remote table keyed on one column.
#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn KeyValueStore>,
    table_name: String,
    key_column: String,
    transforms: Vec<Transform>,
    context: TransformContext,
}

impl fmt::Debug for Uploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Uploader")
            .field("table_name", &self.table_name)
            .field("key_column", &self.key_column)
            .field("transforms", &self.transforms)
            .finish()
    }
}

impl Uploader {
    /// Uploader for `table_name`, keyed on `key_column`.
    pub fn new(store: Arc<dyn KeyValueStore>, table_name: impl Into<String>, key_column: impl Into<String>) -> Self {
        Self {
            store,
            table_name: table_name.into(),
            key_column: key_column.into(),
            transforms: Vec::new(),
            context: TransformContext::now(),
        }
    }

    /// Transforms applied to the loaded table before anything is written.
    pub fn with_transforms(mut self, transforms: Vec<Transform>) -> Self {
        self.transforms = transforms;
        self
    }

    /// Clock used by relative transforms.
    pub fn with_context(mut self, context: TransformContext) -> Self {
        self.context = context;
        self
    }

    /// Load `path` and upload its rows.
    pub async fn upload_file(&self, path: impl AsRef<Path>) -> UploadResult<UploadSummary> {
        let path = path.as_ref();
        let mut stage = UploadStage::Start;
        let result = self.run_file(path, &mut stage).await;
        self.finish(stage, result)
    }

    /// Upload an already loaded table.
    pub async fn upload_table(&self, table: Table) -> UploadResult<UploadSummary> {
        let mut stage = UploadStage::Start;
        let result = self.run_loaded(table, &mut stage).await;
        self.finish(stage, result)
    }

    fn finish(&self, stage: UploadStage, result: UploadResult<UploadSummary>) -> UploadResult<UploadSummary> {
        match &result {
            Ok(summary) => tracing::info!(
                table = %self.table_name,
                loaded = summary.loaded,
                uploaded = summary.uploaded,
                skipped = summary.skipped,
                table_created = summary.table_created,
                "upload finished"
            ),
            Err(e) => tracing::error!(table = %self.table_name, stage = %stage, error = %e, "upload failed"),
        }
        result
    }

    async fn run_file(&self, path: &Path, stage: &mut UploadStage) -> UploadResult<UploadSummary> {
        self.store.verify_connection().await?;
        tracing::info!(stage = %stage, "store connection verified");

        let table = load_file(path, SheetSelection::First)?
            .into_iter()
            .next()
            .map(|loaded| loaded.table)
            .unwrap_or_default();
        tracing::info!(stage = %stage, path = %path.display(), rows = table.row_count(), "file loaded");

        self.run_table(table, stage).await
    }

    async fn run_loaded(&self, table: Table, stage: &mut UploadStage) -> UploadResult<UploadSummary> {
        self.store.verify_connection().await?;
        self.run_table(table, stage).await
    }

    async fn run_table(&self, table: Table, stage: &mut UploadStage) -> UploadResult<UploadSummary> {
        let table = run_transforms(table, &self.transforms, &self.context, None)?;

        let key_index = table
            .schema
            .index_of(&self.key_column)
            .ok_or_else(|| UploadError::MissingKeyColumn {
                column: self.key_column.clone(),
                columns: table.column_names(),
            })?;
        *stage = UploadStage::Validated;

        let (key_type, table_created) = self.ensure_table(&table, key_index).await?;
        *stage = UploadStage::TableReady;
        tracing::info!(
            stage = %stage,
            table = %self.table_name,
            key_type = ?key_type,
            table_created,
            "table ready"
        );

        *stage = UploadStage::Uploading;
        let loaded = table.row_count();
        let uploaded = self.write_rows(&table, key_index, key_type).await?;

        *stage = UploadStage::Done;
        Ok(UploadSummary {
            loaded,
            uploaded,
            skipped: loaded - uploaded,
            table_created,
        })
    }

    /// Create the remote table when it is absent. Returns the table's key type and whether the
    /// table was created.
    async fn ensure_table(&self, table: &Table, key_index: usize) -> UploadResult<(KeyType, bool)> {
        if self.store.table_exists(&self.table_name).await? {
            let existing = self.store.key_schema(&self.table_name).await?;
            tracing::info!(table = %self.table_name, key = %existing.name, "table already exists");
            return Ok((existing.key_type, false));
        }

        let key_type = KeyType::for_column(table.schema.fields[key_index].data_type);
        let key = KeySchema::new(self.key_column.clone(), key_type);
        tracing::info!(table = %self.table_name, key = %key.name, key_type = ?key.key_type, "creating table");
        self.store.create_table(&self.table_name, &key).await?;
        self.store.wait_until_ready(&self.table_name).await?;
        Ok((key_type, true))
    }

    async fn write_rows(&self, table: &Table, key_index: usize, key_type: KeyType) -> UploadResult<usize> {
        let mut uploaded = 0;
        let mut batch: Vec<Item> = Vec::with_capacity(BATCH_LIMIT);
        let mut batch_keys: HashSet<String> = HashSet::with_capacity(BATCH_LIMIT);

        for (idx, row) in table.rows.iter().enumerate() {
            let Some(item) = coerce_row(&table.schema, row, key_index, key_type) else {
                tracing::warn!(
                    row = idx + 1,
                    key = %self.key_column,
                    "skipping row with missing or unusable primary key"
                );
                continue;
            };
            let key = row_key(&item, &self.key_column);

            // A batch may not name the same key twice; flushing keeps the later row as the winner.
            if batch.len() == BATCH_LIMIT || batch_keys.contains(&key) {
                uploaded += self.flush(&mut batch).await?;
                batch_keys.clear();
            }
            batch_keys.insert(key);
            batch.push(item);
        }
        uploaded += self.flush(&mut batch).await?;
        Ok(uploaded)
    }

    async fn flush(&self, batch: &mut Vec<Item>) -> UploadResult<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let items = std::mem::replace(batch, Vec::with_capacity(BATCH_LIMIT));
        let n = items.len();
        self.store.put_items(&self.table_name, items).await?;
        tracing::debug!(table = %self.table_name, items = n, "batch written");
        Ok(n)
    }
}

fn row_key(item: &Item, key_column: &str) -> String {
    item.get(key_column).map(StoreValue::key_text).unwrap_or_default()
}

/// Convert one row to store form, or `None` when its key cell is null or cannot be a `key_type`
/// key. The key cell is converted to `key_type`; other cells keep their natural form.
pub fn coerce_row(schema: &Schema, row: &[Value], key_index: usize, key_type: KeyType) -> Option<Item> {
    let key = key_type.coerce(StoreValue::from_cell(row.get(key_index)?))?;
    let mut item: Item = schema
        .field_names()
        .zip(row)
        .map(|(name, value)| (name.to_string(), StoreValue::from_cell(value)))
        .collect();
    item.insert(schema.fields[key_index].name.clone(), key);
    Some(item)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;

    use bigdecimal::BigDecimal;

    use super::{coerce_row, Uploader};
    use crate::error::{StoreError, UploadError};
    use crate::store::{InMemoryStore, KeySchema, KeyType, KeyValueStore, StoreValue};
    use crate::types::{Table, Value};

    fn contacts(n: i64) -> Table {
        Table::from_cells(
            vec!["id".to_string(), "name".to_string(), "score".to_string()],
            (1..=n)
                .map(|i| vec![Value::Int64(i), Value::Utf8(format!("c{i}")), Value::Float64(i as f64 / 4.0)])
                .collect(),
        )
    }

    #[test]
    fn coerce_row_keeps_nulls_and_makes_decimals() {
        let t = contacts(1);
        let row = [Value::Int64(1), Value::Null, Value::Float64(0.1)];
        let item = coerce_row(&t.schema, &row, 0, KeyType::Number).unwrap();
        assert_eq!(item["id"], StoreValue::Int(1));
        assert_eq!(item["name"], StoreValue::Null);
        assert_eq!(item["score"], StoreValue::Decimal(BigDecimal::from_str("0.1").unwrap()));
        assert!(coerce_row(&t.schema, &[Value::Null, Value::Null, Value::Null], 0, KeyType::Number).is_none());

        let as_text = coerce_row(&t.schema, &row, 0, KeyType::String).unwrap();
        assert_eq!(as_text["id"], StoreValue::Text("1".into()));
        let unusable = [Value::Utf8("n/a".into()), Value::Null, Value::Null];
        assert!(coerce_row(&t.schema, &unusable, 0, KeyType::Number).is_none());
    }

    #[tokio::test]
    async fn creates_numeric_table_and_batches_by_25() {
        let store = Arc::new(InMemoryStore::new());
        let uploader = Uploader::new(store.clone(), "contacts", "id");

        let summary = uploader.upload_table(contacts(60)).await.unwrap();

        assert!(summary.table_created);
        assert_eq!(summary.uploaded, 60);
        assert_eq!(store.batch_sizes(), vec![25, 25, 10]);
        assert_eq!(
            store.key_schema("contacts").await.unwrap(),
            KeySchema::new("id", KeyType::Number)
        );
    }

    #[tokio::test]
    async fn repeated_key_flushes_early_and_last_row_wins() {
        let store = Arc::new(InMemoryStore::new());
        let t = Table::from_cells(
            vec!["id".to_string(), "name".to_string()],
            vec![
                vec![Value::Utf8("a".into()), Value::Utf8("first".into())],
                vec![Value::Utf8("b".into()), Value::Utf8("b".into())],
                vec![Value::Utf8("a".into()), Value::Utf8("second".into())],
            ],
        );

        let summary = Uploader::new(store.clone(), "t", "id").upload_table(t).await.unwrap();

        assert_eq!(summary.uploaded, 3);
        assert_eq!(store.batch_sizes(), vec![2, 1]);
        let items = store.items("t");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["name"], StoreValue::Text("second".into()));
    }

    #[tokio::test]
    async fn existing_table_is_reused_with_its_key_type() {
        let store = Arc::new(InMemoryStore::new().with_table("t", KeySchema::new("id", KeyType::String), vec![]));

        let summary = Uploader::new(store.clone(), "t", "id").upload_table(contacts(2)).await.unwrap();

        assert!(!summary.table_created);
        let ids: Vec<StoreValue> = store.items("t").iter().map(|i| i["id"].clone()).collect();
        assert_eq!(ids, vec![StoreValue::Text("1".into()), StoreValue::Text("2".into())]);
    }

    #[tokio::test]
    async fn numeric_key_column_with_null_first_cell_gets_numeric_table() {
        let store = Arc::new(InMemoryStore::new());
        let t = Table::from_cells(
            vec!["id".to_string(), "name".to_string()],
            vec![
                vec![Value::Null, Value::Utf8("a".into())],
                vec![Value::Int64(2), Value::Utf8("b".into())],
                vec![Value::Int64(3), Value::Utf8("c".into())],
            ],
        );

        let summary = Uploader::new(store.clone(), "t", "id").upload_table(t).await.unwrap();

        assert!(summary.table_created);
        assert_eq!((summary.uploaded, summary.skipped), (2, 1));
        assert_eq!(store.key_schema("t").await.unwrap(), KeySchema::new("id", KeyType::Number));
        assert_eq!(store.items("t")[0]["id"], StoreValue::Int(2));
    }

    #[tokio::test]
    async fn rejected_create_is_an_error() {
        let store = Arc::new(InMemoryStore::new().rejecting_creates("AccessDenied"));

        let err = Uploader::new(store, "t", "id").upload_table(contacts(1)).await.unwrap_err();

        assert!(matches!(err, UploadError::Store(StoreError::CreateRejected { .. })));
    }

    #[tokio::test]
    async fn unreachable_store_fails_before_anything_else() {
        let store = Arc::new(InMemoryStore::new().unreachable());

        let err = Uploader::new(store.clone(), "t", "id").upload_table(contacts(1)).await.unwrap_err();

        assert!(matches!(err, UploadError::Store(StoreError::Request { .. })));
        assert!(!store.table_exists("t").await.unwrap());
    }

    #[tokio::test]
    async fn transforms_run_before_validation() {
        let store = Arc::new(InMemoryStore::new());
        let uploader = Uploader::new(store.clone(), "t", "id").with_transforms(vec!["where:id>1".parse().unwrap()]);

        let summary = uploader.upload_table(contacts(3)).await.unwrap();

        assert_eq!(summary.loaded, 2);
        assert_eq!(summary.uploaded, 2);
    }
}
