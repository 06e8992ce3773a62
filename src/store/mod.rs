//! Key-value store abstraction used by the uploader and the read API.
//!
//! [`KeyValueStore`] is the seam between the pipeline and the remote table. Two implementations
//! ship with the crate:
//!
//! - [`DynamoStore`]: Amazon DynamoDB through `aws-sdk-dynamodb`
//! - [`InMemoryStore`]: a process-local table, used in tests and for dry runs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};

use crate::error::StoreResult;
use crate::types::{DataType, Value};

pub mod dynamodb;
pub mod memory;

pub use dynamodb::DynamoStore;
pub use memory::InMemoryStore;

/// One stored record: attribute name to value.
pub type Item = BTreeMap<String, StoreValue>;

/// Attribute value in store form.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integral number.
    Int(i64),
    /// Exact decimal number.
    Decimal(BigDecimal),
    /// String.
    Text(String),
    /// Ordered list.
    List(Vec<StoreValue>),
    /// Nested map.
    Map(BTreeMap<String, StoreValue>),
}

impl StoreValue {
    /// Coerce a table cell into store form.
    ///
    /// Floats become exact decimals built from their shortest decimal text (`0.1` stays `0.1`).
    pub fn from_cell(value: &Value) -> StoreValue {
        match value {
            Value::Null => StoreValue::Null,
            Value::Int64(v) => StoreValue::Int(*v),
            Value::Float64(v) if v.is_finite() => BigDecimal::from_str(&v.to_string())
                .map(StoreValue::Decimal)
                .unwrap_or(StoreValue::Null),
            Value::Float64(_) => StoreValue::Null,
            Value::Bool(v) => StoreValue::Bool(*v),
            Value::Utf8(s) => StoreValue::Text(s.clone()),
        }
    }

    /// Parse a store number: integral text becomes [`StoreValue::Int`], anything else numeric a
    /// [`StoreValue::Decimal`].
    pub fn parse_number(text: &str) -> Option<StoreValue> {
        let text = text.trim();
        if let Ok(i) = text.parse::<i64>() {
            return Some(StoreValue::Int(i));
        }
        BigDecimal::from_str(text).ok().map(StoreValue::Decimal)
    }

    /// `true` for [`StoreValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, StoreValue::Null)
    }

    /// JSON form: decimals as floats, integers as integers, nulls as `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            StoreValue::Null => serde_json::Value::Null,
            StoreValue::Bool(b) => serde_json::Value::Bool(*b),
            StoreValue::Int(i) => serde_json::Value::from(*i),
            StoreValue::Decimal(d) => d
                .to_f64()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            StoreValue::Text(s) => serde_json::Value::String(s.clone()),
            StoreValue::List(items) => serde_json::Value::Array(items.iter().map(StoreValue::to_json).collect()),
            StoreValue::Map(map) => item_to_json(map),
        }
    }

    /// Canonical text used to compare key values (`1`, `1.0` and `1.00` are the same number).
    pub(crate) fn key_text(&self) -> String {
        match self {
            StoreValue::Decimal(d) => {
                let n = d.normalized();
                match n.to_i64() {
                    Some(i) if BigDecimal::from(i) == n => i.to_string(),
                    _ => n.to_string(),
                }
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for StoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreValue::Null => f.write_str("null"),
            StoreValue::Bool(b) => write!(f, "{b}"),
            StoreValue::Int(i) => write!(f, "{i}"),
            StoreValue::Decimal(d) => write!(f, "{d}"),
            StoreValue::Text(s) => f.write_str(s),
            StoreValue::List(_) | StoreValue::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}

/// JSON object for a stored record.
pub fn item_to_json(item: &Item) -> serde_json::Value {
    serde_json::Value::Object(item.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

/// Scalar type of a table's hash key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Numeric key (DynamoDB `N`).
    Number,
    /// String key (DynamoDB `S`).
    String,
}

impl KeyType {
    /// Key type for a key column of type `data_type`: numeric columns give [`KeyType::Number`],
    /// everything else [`KeyType::String`]. Null cells do not influence the choice.
    pub fn for_column(data_type: DataType) -> KeyType {
        match data_type {
            DataType::Int64 | DataType::Float64 => KeyType::Number,
            DataType::Bool | DataType::Utf8 => KeyType::String,
        }
    }

    /// `true` if `value` is a scalar of this type.
    pub fn matches(self, value: &StoreValue) -> bool {
        matches!(
            (self, value),
            (KeyType::Number, StoreValue::Int(_) | StoreValue::Decimal(_)) | (KeyType::String, StoreValue::Text(_))
        )
    }

    /// Convert `value` into a key of this type, or `None` when it cannot be one.
    ///
    /// Numbers and booleans become their text for string keys; numeric text becomes a number for
    /// numeric keys.
    pub fn coerce(self, value: StoreValue) -> Option<StoreValue> {
        match (self, value) {
            (_, StoreValue::Null) => None,
            (key_type, value) if key_type.matches(&value) => Some(value),
            (KeyType::String, value @ (StoreValue::Int(_) | StoreValue::Decimal(_) | StoreValue::Bool(_))) => {
                Some(StoreValue::Text(value.to_string()))
            }
            (KeyType::Number, StoreValue::Text(text)) => StoreValue::parse_number(&text),
            _ => None,
        }
    }
}

/// The single hash key of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    /// Key attribute name.
    pub name: String,
    /// Key scalar type.
    pub key_type: KeyType,
}

impl KeySchema {
    /// Create a key schema.
    pub fn new(name: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            name: name.into(),
            key_type,
        }
    }

    /// Interpret a key given as text (e.g. a URL path segment).
    ///
    /// Returns `None` when a numeric key is not a number, since no record can match it.
    pub fn parse_key(&self, text: &str) -> Option<StoreValue> {
        match self.key_type {
            KeyType::Number => StoreValue::parse_number(text),
            KeyType::String => Some(StoreValue::Text(text.to_string())),
        }
    }
}

/// One page of a scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPage {
    /// Records in this page.
    pub items: Vec<Item>,
    /// Where to resume; `None` on the last page.
    pub next: Option<Item>,
}

/// A remote keyed table store.
///
/// Every method is a single request from the caller's point of view; implementations may retry
/// internally.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Check that the store is reachable with the configured credentials.
    async fn verify_connection(&self) -> StoreResult<()>;

    /// `true` if `table` exists.
    async fn table_exists(&self, table: &str) -> StoreResult<bool>;

    /// The hash key of `table`.
    async fn key_schema(&self, table: &str) -> StoreResult<KeySchema>;

    /// Create `table` with a single hash key and on-demand capacity.
    async fn create_table(&self, table: &str, key: &KeySchema) -> StoreResult<()>;

    /// Block until `table` accepts reads and writes. There is no timeout.
    async fn wait_until_ready(&self, table: &str) -> StoreResult<()>;

    /// Write `items` (upsert by key). Callers keep batches within the store's limit and without
    /// repeated keys.
    async fn put_items(&self, table: &str, items: Vec<Item>) -> StoreResult<()>;

    /// Read one page of `table`, starting after `start`.
    async fn scan_page(&self, table: &str, start: Option<Item>) -> StoreResult<ScanPage>;

    /// Fetch the record whose key attribute `key.name` equals `value`.
    async fn get_item(&self, table: &str, key: &KeySchema, value: &StoreValue) -> StoreResult<Option<Item>>;
}

/// Read every record of `table`, following pagination until the store reports no more pages.
pub async fn scan_all(store: &dyn KeyValueStore, table: &str) -> StoreResult<Vec<Item>> {
    let mut items = Vec::new();
    let mut start = None;
    loop {
        let page = store.scan_page(table, start).await?;
        items.extend(page.items);
        match page.next {
            Some(next) => start = Some(next),
            None => return Ok(items),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bigdecimal::BigDecimal;
    use serde_json::json;

    use super::{item_to_json, Item, KeySchema, KeyType, StoreValue};
    use crate::types::{DataType, Value};

    #[test]
    fn floats_become_exact_decimals() {
        assert_eq!(
            StoreValue::from_cell(&Value::Float64(0.1)),
            StoreValue::Decimal(BigDecimal::from_str("0.1").unwrap())
        );
        assert_eq!(StoreValue::from_cell(&Value::Int64(7)), StoreValue::Int(7));
        assert_eq!(StoreValue::from_cell(&Value::Null), StoreValue::Null);
    }

    #[test]
    fn json_renders_decimals_as_floats() {
        let mut item = Item::new();
        item.insert("EmailId".to_string(), StoreValue::Text("a@x.io".to_string()));
        item.insert("score".to_string(), StoreValue::Decimal(BigDecimal::from_str("98.5").unwrap()));
        item.insert("visits".to_string(), StoreValue::Int(3));
        item.insert("phone".to_string(), StoreValue::Null);
        item.insert(
            "tags".to_string(),
            StoreValue::List(vec![StoreValue::Text("vip".to_string()), StoreValue::Bool(true)]),
        );

        assert_eq!(
            item_to_json(&item),
            json!({"EmailId": "a@x.io", "score": 98.5, "visits": 3, "phone": null, "tags": ["vip", true]})
        );
    }

    #[test]
    fn key_type_inference_and_parsing() {
        assert_eq!(KeyType::for_column(DataType::Int64), KeyType::Number);
        assert_eq!(KeyType::for_column(DataType::Float64), KeyType::Number);
        assert_eq!(KeyType::for_column(DataType::Utf8), KeyType::String);
        assert_eq!(KeyType::for_column(DataType::Bool), KeyType::String);

        let numeric = KeySchema::new("id", KeyType::Number);
        assert_eq!(numeric.parse_key("42"), Some(StoreValue::Int(42)));
        assert_eq!(numeric.parse_key("abc"), None);
        let text = KeySchema::new("EmailId", KeyType::String);
        assert_eq!(text.parse_key("42"), Some(StoreValue::Text("42".to_string())));
    }

    #[test]
    fn keys_coerce_to_the_table_key_type() {
        assert_eq!(KeyType::String.coerce(StoreValue::Int(7)), Some(StoreValue::Text("7".to_string())));
        assert_eq!(
            KeyType::Number.coerce(StoreValue::Text("12.5".to_string())),
            Some(StoreValue::Decimal(BigDecimal::from_str("12.5").unwrap()))
        );
        assert_eq!(KeyType::Number.coerce(StoreValue::Text("abc".to_string())), None);
        assert_eq!(KeyType::Number.coerce(StoreValue::Null), None);
        assert_eq!(KeyType::String.coerce(StoreValue::List(vec![])), None);
        assert!(!KeyType::Number.matches(&StoreValue::Text("1".to_string())));
    }

    #[test]
    fn numeric_key_text_ignores_trailing_zeros() {
        let a = StoreValue::Decimal(BigDecimal::from_str("1.00").unwrap());
        assert_eq!(a.key_text(), StoreValue::Int(1).key_text());
    }
}
