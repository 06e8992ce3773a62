//! Process-local [`KeyValueStore`].

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

use super::{Item, KeySchema, KeyValueStore, ScanPage, StoreValue};

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug)]
struct MemTable {
    key: KeySchema,
    // Insertion order; a put with an existing key replaces in place.
    items: Vec<Item>,
}

impl MemTable {
    fn position(&self, key: &StoreValue) -> Option<usize> {
        let wanted = key.key_text();
        self.items
            .iter()
            .position(|item| item.get(&self.key.name).is_some_and(|v| v.key_text() == wanted))
    }
}

/// A [`KeyValueStore`] that keeps tables in memory.
///
/// Scans page in insertion order. Writes follow DynamoDB's batch rules: every item needs a key of
/// the table's key type and a batch may not repeat a key.
#[derive(Debug)]
pub struct InMemoryStore {
    tables: Mutex<BTreeMap<String, MemTable>>,
    page_size: usize,
    reachable: bool,
    reject_creates: Option<String>,
    batch_sizes: Mutex<Vec<usize>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(BTreeMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
            reachable: true,
            reject_creates: None,
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    /// Return at most `page_size` items per scan page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Add a table holding `items`.
    pub fn with_table(self, table: impl Into<String>, key: KeySchema, items: Vec<Item>) -> Self {
        self.lock_tables().insert(table.into(), MemTable { key, items });
        self
    }

    /// Fail every [`KeyValueStore::verify_connection`] call.
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    /// Refuse every [`KeyValueStore::create_table`] call with `message`.
    pub fn rejecting_creates(mut self, message: impl Into<String>) -> Self {
        self.reject_creates = Some(message.into());
        self
    }

    /// Copy of every record in `table`, in insertion order.
    pub fn items(&self, table: &str) -> Vec<Item> {
        self.lock_tables()
            .get(table)
            .map(|t| t.items.clone())
            .unwrap_or_default()
    }

    /// Size of every batch passed to `put_items`, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn lock_tables(&self) -> MutexGuard<'_, BTreeMap<String, MemTable>> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn not_found(table: &str) -> StoreError {
    StoreError::TableNotFound {
        table: table.to_string(),
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn verify_connection(&self) -> StoreResult<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(StoreError::Request {
                operation: "verify_connection",
                message: "store unreachable".to_string(),
            })
        }
    }

    async fn table_exists(&self, table: &str) -> StoreResult<bool> {
        Ok(self.lock_tables().contains_key(table))
    }

    async fn key_schema(&self, table: &str) -> StoreResult<KeySchema> {
        self.lock_tables()
            .get(table)
            .map(|t| t.key.clone())
            .ok_or_else(|| not_found(table))
    }

    async fn create_table(&self, table: &str, key: &KeySchema) -> StoreResult<()> {
        if let Some(message) = &self.reject_creates {
            return Err(StoreError::CreateRejected {
                table: table.to_string(),
                message: message.clone(),
            });
        }
        let mut tables = self.lock_tables();
        if tables.contains_key(table) {
            return Err(StoreError::CreateRejected {
                table: table.to_string(),
                message: "table already exists".to_string(),
            });
        }
        tables.insert(
            table.to_string(),
            MemTable {
                key: key.clone(),
                items: Vec::new(),
            },
        );
        Ok(())
    }

    async fn wait_until_ready(&self, table: &str) -> StoreResult<()> {
        if self.lock_tables().contains_key(table) {
            Ok(())
        } else {
            Err(not_found(table))
        }
    }

    async fn put_items(&self, table: &str, items: Vec<Item>) -> StoreResult<()> {
        let mut tables = self.lock_tables();
        let mem = tables.get_mut(table).ok_or_else(|| not_found(table))?;

        let mut keys = Vec::with_capacity(items.len());
        for item in &items {
            let key = match item.get(&mem.key.name) {
                Some(v) if mem.key.key_type.matches(v) => v.key_text(),
                Some(v) if !v.is_null() => {
                    return Err(StoreError::InvalidValue {
                        attribute: mem.key.name.clone(),
                        message: format!("key value {v} does not match key type {:?}", mem.key.key_type),
                    });
                }
                _ => {
                    return Err(StoreError::InvalidValue {
                        attribute: mem.key.name.clone(),
                        message: "missing key attribute".to_string(),
                    });
                }
            };
            if keys.contains(&key) {
                return Err(StoreError::Request {
                    operation: "put_items",
                    message: format!("batch contains duplicate key {key}"),
                });
            }
            keys.push(key);
        }

        self.batch_sizes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(items.len());
        for item in items {
            let existing = item.get(&mem.key.name).and_then(|k| mem.position(k));
            match existing {
                Some(idx) => mem.items[idx] = item,
                None => mem.items.push(item),
            }
        }
        Ok(())
    }

    async fn scan_page(&self, table: &str, start: Option<Item>) -> StoreResult<ScanPage> {
        let tables = self.lock_tables();
        let mem = tables.get(table).ok_or_else(|| not_found(table))?;

        let from = match start.as_ref().and_then(|s| s.get(&mem.key.name)) {
            Some(key) => mem.position(key).map_or(mem.items.len(), |i| i + 1),
            None => 0,
        };
        let end = (from + self.page_size).min(mem.items.len());
        let items = mem.items[from..end].to_vec();
        let next = if end < mem.items.len() {
            items.last().and_then(|last| {
                last.get(&mem.key.name)
                    .map(|k| Item::from([(mem.key.name.clone(), k.clone())]))
            })
        } else {
            None
        };
        Ok(ScanPage { items, next })
    }

    async fn get_item(&self, table: &str, key: &KeySchema, value: &StoreValue) -> StoreResult<Option<Item>> {
        let tables = self.lock_tables();
        let mem = tables.get(table).ok_or_else(|| not_found(table))?;
        if mem.key.name != key.name {
            return Err(StoreError::Request {
                operation: "get_item",
                message: format!("'{}' is not the key of table '{table}'", key.name),
            });
        }
        Ok(mem.position(value).map(|i| mem.items[i].clone()))
    }
}
