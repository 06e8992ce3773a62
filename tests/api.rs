use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use crm_data_sync::api::{configure, ApiState};
use crm_data_sync::store::{InMemoryStore, Item, KeySchema, KeyType, StoreValue};
use serde_json::{json, Value};

const TOKEN: &str = "s3cret";
const TABLE: &str = "crm_contacts";

fn contact(id: i64, name: &str) -> Item {
    Item::from([
        ("id".to_string(), StoreValue::Int(id)),
        ("name".to_string(), StoreValue::Text(name.to_string())),
        ("score".to_string(), StoreValue::Decimal("87.25".parse().unwrap())),
    ])
}

fn seeded_store() -> InMemoryStore {
    InMemoryStore::new().with_page_size(2).with_table(
        TABLE,
        KeySchema::new("id", KeyType::Number),
        vec![contact(1, "Ada"), contact(2, "Grace"), contact(3, "Linus")],
    )
}

macro_rules! app {
    ($store:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(ApiState::new(Arc::new($store), TABLE, TOKEN)))
                .configure(configure),
        )
        .await
    };
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

#[actix_web::test]
async fn lists_every_record_across_pages() {
    let app = app!(seeded_store());

    let req = test::TestRequest::get()
        .uri("/api/crm/data")
        .insert_header(bearer(TOKEN))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["success"], json!(true));
    assert_eq!(body["count"], json!(3));
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Ada", "Grace", "Linus"]);
    assert_eq!(body["data"][0]["score"], json!(87.25));
}

#[actix_web::test]
async fn gets_one_record_by_key() {
    let app = app!(seeded_store());

    let req = test::TestRequest::get()
        .uri("/api/crm/data/2")
        .insert_header(bearer(TOKEN))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(
        body,
        json!({"success": true, "data": {"id": 2, "name": "Grace", "score": 87.25}})
    );
}

#[actix_web::test]
async fn unknown_key_is_not_found() {
    let app = app!(seeded_store());

    for key in ["42", "not-a-number"] {
        let req = test::TestRequest::get()
            .uri(&format!("/api/crm/data/{key}"))
            .insert_header(bearer(TOKEN))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "Record not found"}));
    }
}

#[actix_web::test]
async fn missing_or_wrong_token_is_unauthorized() {
    let app = app!(seeded_store());

    let requests = [
        test::TestRequest::get().uri("/api/crm/data").to_request(),
        test::TestRequest::get()
            .uri("/api/crm/data/1")
            .insert_header(bearer("wrong"))
            .to_request(),
        test::TestRequest::get()
            .uri("/api/crm/data")
            .insert_header(("Authorization", TOKEN))
            .to_request(),
    ];
    for req in requests {
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "Invalid or missing auth token"}));
    }
}

#[actix_web::test]
async fn string_keys_match_text() {
    let store = InMemoryStore::new().with_table(
        TABLE,
        KeySchema::new("EmailId", KeyType::String),
        vec![Item::from([(
            "EmailId".to_string(),
            StoreValue::Text("ada@example.com".to_string()),
        )])],
    );
    let app = app!(store);

    let req = test::TestRequest::get()
        .uri("/api/crm/data/ada@example.com")
        .insert_header(bearer(TOKEN))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn store_failures_are_server_errors() {
    let app = app!(InMemoryStore::new());

    let list = test::TestRequest::get()
        .uri("/api/crm/data")
        .insert_header(bearer(TOKEN))
        .to_request();
    let resp = test::call_service(&app, list).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("crm_contacts"));

    let get = test::TestRequest::get()
        .uri("/api/crm/data/1")
        .insert_header(bearer(TOKEN))
        .to_request();
    let resp = test::call_service(&app, get).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
