use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use crm_data_sync::store::{InMemoryStore, KeySchema, KeyType, KeyValueStore, StoreValue};
use crm_data_sync::upload::Uploader;
use crm_data_sync::{IngestionError, UploadError};

const TABLE: &str = "crm_contacts";

#[tokio::test]
async fn uploads_file_skipping_rows_without_key() {
    let store = Arc::new(InMemoryStore::new());
    let uploader = Uploader::new(store.clone(), TABLE, "EmailId");

    let summary = uploader.upload_file("tests/fixtures/upload/contacts.csv").await.unwrap();

    assert_eq!(summary.loaded, 4);
    assert_eq!(summary.uploaded, 3);
    assert_eq!(summary.skipped, 1);
    assert!(summary.table_created);
    assert_eq!(
        store.key_schema(TABLE).await.unwrap(),
        KeySchema::new("EmailId", KeyType::String)
    );

    let items = store.items(TABLE);
    let emails: Vec<String> = items.iter().map(|i| i["EmailId"].to_string()).collect();
    assert_eq!(emails, vec!["ada@example.com", "grace@example.com", "linus@example.com"]);
    assert_eq!(
        items[0]["Score"],
        StoreValue::Decimal(BigDecimal::from_str("98.5").unwrap())
    );
    assert_eq!(items[0]["Signup Date"], StoreValue::Text("2025-03-01".to_string()));
}

#[tokio::test]
async fn second_upload_reuses_table_and_overwrites_by_key() {
    let store = Arc::new(InMemoryStore::new());
    let uploader = Uploader::new(store.clone(), TABLE, "EmailId");

    uploader.upload_file("tests/fixtures/upload/contacts.csv").await.unwrap();
    let again = uploader.upload_file("tests/fixtures/upload/contacts.csv").await.unwrap();

    assert!(!again.table_created);
    assert_eq!(again.uploaded, 3);
    assert_eq!(store.items(TABLE).len(), 3);
}

#[tokio::test]
async fn transforms_apply_before_upload() {
    let store = Arc::new(InMemoryStore::new());
    let uploader = Uploader::new(store.clone(), TABLE, "EmailId")
        .with_transforms(vec!["where:Score>=80".parse().unwrap()]);

    let summary = uploader.upload_file("tests/fixtures/upload/contacts.csv").await.unwrap();

    assert_eq!(summary.loaded, 2);
    assert_eq!(summary.uploaded, 2);
    assert_eq!(summary.skipped, 0);
}

#[tokio::test]
async fn missing_key_column_is_rejected_before_table_creation() {
    let store = Arc::new(InMemoryStore::new());
    let uploader = Uploader::new(store.clone(), TABLE, "CustomerId");

    let err = uploader.upload_file("tests/fixtures/upload/contacts.csv").await.unwrap_err();

    match err {
        UploadError::MissingKeyColumn { column, columns } => {
            assert_eq!(column, "CustomerId");
            assert_eq!(columns, vec!["EmailId", "FirstName", "Score", "Signup Date"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!store.table_exists(TABLE).await.unwrap());
}

#[tokio::test]
async fn unsupported_file_is_an_ingestion_error() {
    let store = Arc::new(InMemoryStore::new());
    let uploader = Uploader::new(store.clone(), TABLE, "EmailId");

    let err = uploader.upload_file("tests/fixtures/upload/contacts.txt").await.unwrap_err();

    assert!(matches!(
        err,
        UploadError::Ingestion(IngestionError::UnsupportedFormat { .. })
    ));
    assert!(store.batch_sizes().is_empty());
}
