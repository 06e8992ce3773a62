//! Read-only HTTP API over the remote table.
//!
//! Routes (all under `/api`, all requiring `Authorization: Bearer <token>`):
//!
//! - `GET /api/crm/data`: every record, `{"success": true, "count": n, "data": [...]}`
//! - `GET /api/crm/data/{key}`: one record by key, `{"success": true, "data": {...}}`, or 404

use std::sync::Arc;

use actix_web::http::header::AUTHORIZATION;
use actix_web::{get, web, App, HttpRequest, HttpResponse, HttpServer};
use serde_json::json;
use tokio::sync::OnceCell;

use crate::error::StoreResult;
use crate::store::{item_to_json, scan_all, KeySchema, KeyValueStore};

/// Shared request state.
pub struct ApiState {
    store: Arc<dyn KeyValueStore>,
    table_name: String,
    auth_token: String,
    key: OnceCell<KeySchema>,
}

impl ApiState {
    /// State serving `table_name` from `store`, guarded by `auth_token`.
    pub fn new(store: Arc<dyn KeyValueStore>, table_name: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            store,
            table_name: table_name.into(),
            auth_token: auth_token.into(),
            key: OnceCell::new(),
        }
    }

    /// The table's key, looked up once and cached.
    async fn key(&self) -> StoreResult<&KeySchema> {
        self.key
            .get_or_try_init(|| self.store.key_schema(&self.table_name))
            .await
    }

    fn authorized(&self, req: &HttpRequest) -> bool {
        req.headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == self.auth_token)
    }
}

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(json!({"error": "Invalid or missing auth token"}))
}

fn server_error(e: impl std::fmt::Display) -> HttpResponse {
    HttpResponse::InternalServerError().json(json!({"error": e.to_string()}))
}

#[get("/crm/data")]
async fn list_records(state: web::Data<ApiState>, req: HttpRequest) -> HttpResponse {
    if !state.authorized(&req) {
        return unauthorized();
    }

    match scan_all(state.store.as_ref(), &state.table_name).await {
        Ok(items) => {
            tracing::info!(table = %state.table_name, count = items.len(), "records listed");
            let data: Vec<serde_json::Value> = items.iter().map(item_to_json).collect();
            HttpResponse::Ok().json(json!({"success": true, "count": data.len(), "data": data}))
        }
        Err(e) => {
            tracing::error!(table = %state.table_name, error = %e, "scan failed");
            server_error(e)
        }
    }
}

#[get("/crm/data/{key}")]
async fn get_record(state: web::Data<ApiState>, req: HttpRequest, path: web::Path<String>) -> HttpResponse {
    if !state.authorized(&req) {
        return unauthorized();
    }
    let raw_key = path.into_inner();

    let key = match state.key().await {
        Ok(key) => key,
        Err(e) => {
            tracing::error!(table = %state.table_name, error = %e, "key lookup failed");
            return server_error(e);
        }
    };

    // A non-numeric value can never match a numeric key.
    let Some(value) = key.parse_key(&raw_key) else {
        return HttpResponse::NotFound().json(json!({"error": "Record not found"}));
    };

    match state.store.get_item(&state.table_name, key, &value).await {
        Ok(Some(item)) => HttpResponse::Ok().json(json!({"success": true, "data": item_to_json(&item)})),
        Ok(None) => HttpResponse::NotFound().json(json!({"error": "Record not found"})),
        Err(e) => {
            tracing::error!(table = %state.table_name, key = %raw_key, error = %e, "get_item failed");
            server_error(e)
        }
    }
}

/// Register the API routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api").service(list_records).service(get_record));
}

/// Serve the API on `host:port` until shutdown.
pub async fn start_server(state: ApiState, host: &str, port: u16) -> std::io::Result<()> {
    let data = web::Data::new(state);
    tracing::info!(host, port, table = %data.table_name, "starting read API");
    HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
        .bind((host, port))?
        .run()
        .await
}
