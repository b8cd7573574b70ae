//! Owner commands over HTTP. Every endpoint answers `{"reply": "<text>"}`,
//! errors included; missing fields are passed through as empty strings so
//! the command itself produces the message.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: String,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    #[serde(default)]
    pub owner: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: String,
}

fn reply(text: String) -> Json<Value> {
    Json(json!({ "reply": text }))
}

/// POST /commands/track
pub async fn track_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TrackRequest>,
) -> Json<Value> {
    reply(state.commands.track(&req.name, &req.owner).await)
}

/// POST /commands/untrack
pub async fn untrack_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TrackRequest>,
) -> Json<Value> {
    reply(state.commands.untrack(&req.name, &req.owner).await)
}

/// GET /commands/list?owner=
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<OwnerQuery>,
) -> Json<Value> {
    reply(state.commands.list(&q.owner).await)
}

/// GET /commands/status?name=&owner=
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<StatusQuery>,
) -> Json<Value> {
    reply(state.commands.status(&q.name, &q.owner).await)
}
