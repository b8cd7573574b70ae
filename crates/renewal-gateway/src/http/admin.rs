use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use renewal_store::TableName;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /admin/tables/{table}: row count for one table.
pub async fn table_handler(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let table: TableName = table
        .parse()
        .map_err(|e: renewal_store::StoreError| {
            (StatusCode::NOT_FOUND, Json(json!({"error": e.to_string()})))
        })?;
    Ok(Json(json!({
        "table": table.as_str(),
        "rows": state.store.row_count(table),
    })))
}

/// GET /admin/jobs: scheduler job snapshots.
pub async fn jobs_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "jobs": state.scheduler.list_jobs() }))
}
