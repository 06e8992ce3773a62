//! Amazon DynamoDB backed [`KeyValueStore`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::{Credentials, Region};
use aws_sdk_dynamodb::error::{BuildError, DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType as DynamoKeyType, PutRequest,
    ScalarAttributeType, TableStatus, WriteRequest,
};
use aws_sdk_dynamodb::Client;

use crate::error::{StoreError, StoreResult};

use super::{Item, KeySchema, KeyType, KeyValueStore, ScanPage, StoreValue};

/// How often `wait_until_ready` polls the table status.
const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Attempts for a batch whose items keep coming back unprocessed.
const MAX_BATCH_ATTEMPTS: u32 = 8;

/// Connection settings for [`DynamoStore::connect`].
#[derive(Debug, Clone)]
pub struct DynamoSettings {
    /// AWS region, e.g. `us-east-1`.
    pub region: String,
    /// Endpoint override (DynamoDB Local, LocalStack).
    pub endpoint_url: Option<String>,
    /// Static access key id.
    pub access_key_id: String,
    /// Static secret access key.
    pub secret_access_key: String,
}

/// DynamoDB store.
#[derive(Debug, Clone)]
pub struct DynamoStore {
    client: Client,
}

impl DynamoStore {
    /// Wrap an existing client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from explicit settings (no profile or instance credentials lookup).
    pub async fn connect(settings: &DynamoSettings) -> Self {
        let credentials = Credentials::new(
            &settings.access_key_id,
            &settings.secret_access_key,
            None,
            None,
            "crm-config",
        );
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials);
        if let Some(url) = &settings.endpoint_url {
            loader = loader.endpoint_url(url);
        }
        let sdk_config = loader.load().await;
        Self::new(Client::new(&sdk_config))
    }

    async fn describe_status(&self, table: &str) -> StoreResult<Option<TableStatus>> {
        match self.client.describe_table().table_name(table).send().await {
            Ok(out) => Ok(out.table().and_then(|t| t.table_status()).cloned()),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(request_error("describe_table", &err)),
        }
    }
}

fn request_error<E: std::error::Error>(operation: &'static str, err: &E) -> StoreError {
    StoreError::Request {
        operation,
        message: DisplayErrorContext(err).to_string(),
    }
}

fn is_not_found<R>(err: &SdkError<DescribeTableError, R>) -> bool {
    err.as_service_error()
        .is_some_and(|e| e.is_resource_not_found_exception())
}

fn to_attribute(value: &StoreValue) -> AttributeValue {
    match value {
        StoreValue::Null => AttributeValue::Null(true),
        StoreValue::Bool(b) => AttributeValue::Bool(*b),
        StoreValue::Int(i) => AttributeValue::N(i.to_string()),
        StoreValue::Decimal(d) => AttributeValue::N(d.to_plain_string()),
        StoreValue::Text(s) => AttributeValue::S(s.clone()),
        StoreValue::List(items) => AttributeValue::L(items.iter().map(to_attribute).collect()),
        StoreValue::Map(map) => AttributeValue::M(to_attribute_map(map)),
    }
}

fn to_attribute_map(item: &Item) -> HashMap<String, AttributeValue> {
    item.iter().map(|(k, v)| (k.clone(), to_attribute(v))).collect()
}

fn from_attribute(value: &AttributeValue) -> StoreValue {
    match value {
        AttributeValue::S(s) => StoreValue::Text(s.clone()),
        AttributeValue::N(n) => StoreValue::parse_number(n).unwrap_or_else(|| StoreValue::Text(n.clone())),
        AttributeValue::Bool(b) => StoreValue::Bool(*b),
        AttributeValue::Null(_) => StoreValue::Null,
        AttributeValue::L(items) => StoreValue::List(items.iter().map(from_attribute).collect()),
        AttributeValue::M(map) => StoreValue::Map(from_attribute_map(map)),
        AttributeValue::Ss(values) => StoreValue::List(values.iter().cloned().map(StoreValue::Text).collect()),
        AttributeValue::Ns(values) => StoreValue::List(
            values
                .iter()
                .map(|n| StoreValue::parse_number(n).unwrap_or_else(|| StoreValue::Text(n.clone())))
                .collect(),
        ),
        AttributeValue::B(blob) => StoreValue::Text(String::from_utf8_lossy(blob.as_ref()).into_owned()),
        _ => StoreValue::Null,
    }
}

fn from_attribute_map(map: &HashMap<String, AttributeValue>) -> Item {
    map.iter().map(|(k, v)| (k.clone(), from_attribute(v))).collect()
}

fn build_error(operation: &'static str, err: BuildError) -> StoreError {
    StoreError::Request {
        operation,
        message: err.to_string(),
    }
}

#[async_trait]
impl KeyValueStore for DynamoStore {
    async fn verify_connection(&self) -> StoreResult<()> {
        self.client
            .list_tables()
            .limit(1)
            .send()
            .await
            .map_err(|e| request_error("verify_connection", &e))?;
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> StoreResult<bool> {
        Ok(self.describe_status(table).await?.is_some())
    }

    async fn key_schema(&self, table: &str) -> StoreResult<KeySchema> {
        let out = match self.client.describe_table().table_name(table).send().await {
            Ok(out) => out,
            Err(err) if is_not_found(&err) => {
                return Err(StoreError::TableNotFound {
                    table: table.to_string(),
                });
            }
            Err(err) => return Err(request_error("describe_table", &err)),
        };
        let description = out.table().ok_or_else(|| StoreError::TableNotFound {
            table: table.to_string(),
        })?;

        let hash = description
            .key_schema()
            .iter()
            .find(|k| *k.key_type() == DynamoKeyType::Hash)
            .ok_or_else(|| StoreError::Request {
                operation: "describe_table",
                message: format!("table '{table}' has no hash key"),
            })?;
        let name = hash.attribute_name().to_string();
        let key_type = match description
            .attribute_definitions()
            .iter()
            .find(|d| d.attribute_name() == name)
            .map(|d| d.attribute_type())
        {
            Some(ScalarAttributeType::N) => KeyType::Number,
            _ => KeyType::String,
        };
        Ok(KeySchema { name, key_type })
    }

    async fn create_table(&self, table: &str, key: &KeySchema) -> StoreResult<()> {
        let attribute_type = match key.key_type {
            KeyType::Number => ScalarAttributeType::N,
            KeyType::String => ScalarAttributeType::S,
        };
        let key_element = KeySchemaElement::builder()
            .attribute_name(&key.name)
            .key_type(DynamoKeyType::Hash)
            .build()
            .map_err(|e| build_error("create_table", e))?;
        let definition = AttributeDefinition::builder()
            .attribute_name(&key.name)
            .attribute_type(attribute_type)
            .build()
            .map_err(|e| build_error("create_table", e))?;

        self.client
            .create_table()
            .table_name(table)
            .key_schema(key_element)
            .attribute_definitions(definition)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| StoreError::CreateRejected {
                table: table.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }

    async fn wait_until_ready(&self, table: &str) -> StoreResult<()> {
        loop {
            // A freshly created table may briefly be reported as missing.
            if let Some(TableStatus::Active) = self.describe_status(table).await? {
                return Ok(());
            }
            tracing::debug!(table, "waiting for table to become active");
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    async fn put_items(&self, table: &str, items: Vec<Item>) -> StoreResult<()> {
        let mut pending = items
            .iter()
            .map(|item| {
                PutRequest::builder()
                    .set_item(Some(to_attribute_map(item)))
                    .build()
                    .map(|put| WriteRequest::builder().put_request(put).build())
                    .map_err(|e| build_error("put_items", e))
            })
            .collect::<StoreResult<Vec<WriteRequest>>>()?;

        let mut attempt = 0;
        while !pending.is_empty() {
            attempt += 1;
            let out = self
                .client
                .batch_write_item()
                .request_items(table, pending)
                .send()
                .await
                .map_err(|e| request_error("batch_write_item", &e))?;

            pending = out
                .unprocessed_items()
                .and_then(|m| m.get(table))
                .cloned()
                .unwrap_or_default();
            if pending.is_empty() {
                break;
            }
            if attempt >= MAX_BATCH_ATTEMPTS {
                return Err(StoreError::Request {
                    operation: "batch_write_item",
                    message: format!("{} items still unprocessed after {attempt} attempts", pending.len()),
                });
            }
            let backoff = Duration::from_millis(50 * 2u64.pow(attempt));
            tracing::warn!(table, unprocessed = pending.len(), attempt, "retrying unprocessed items");
            tokio::time::sleep(backoff).await;
        }
        Ok(())
    }

    async fn scan_page(&self, table: &str, start: Option<Item>) -> StoreResult<ScanPage> {
        let out = self
            .client
            .scan()
            .table_name(table)
            .set_exclusive_start_key(start.as_ref().map(to_attribute_map))
            .send()
            .await
            .map_err(|e| request_error("scan", &e))?;

        Ok(ScanPage {
            items: out.items().iter().map(from_attribute_map).collect(),
            next: out.last_evaluated_key().map(from_attribute_map),
        })
    }

    async fn get_item(&self, table: &str, key: &KeySchema, value: &StoreValue) -> StoreResult<Option<Item>> {
        let out = self
            .client
            .get_item()
            .table_name(table)
            .key(&key.name, to_attribute(value))
            .send()
            .await
            .map_err(|e| request_error("get_item", &e))?;
        Ok(out.item().map(from_attribute_map))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use aws_sdk_dynamodb::types::AttributeValue;
    use bigdecimal::BigDecimal;

    use super::{from_attribute, to_attribute};
    use crate::store::StoreValue;

    #[test]
    fn numbers_map_to_n_and_back() {
        let d = StoreValue::Decimal(BigDecimal::from_str("12.50").unwrap());
        assert_eq!(to_attribute(&d), AttributeValue::N("12.50".to_string()));
        assert_eq!(from_attribute(&AttributeValue::N("7".to_string())), StoreValue::Int(7));
        assert_eq!(
            from_attribute(&AttributeValue::N("0.25".to_string())),
            StoreValue::Decimal(BigDecimal::from_str("0.25").unwrap())
        );
    }

    #[test]
    fn null_and_nested_values() {
        assert_eq!(to_attribute(&StoreValue::Null), AttributeValue::Null(true));
        let list = AttributeValue::L(vec![AttributeValue::S("a".to_string()), AttributeValue::Bool(false)]);
        assert_eq!(
            from_attribute(&list),
            StoreValue::List(vec![StoreValue::Text("a".to_string()), StoreValue::Bool(false)])
        );
    }
}
