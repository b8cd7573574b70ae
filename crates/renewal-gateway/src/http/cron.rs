//! Evaluation trigger: POST /cron/evaluate.
//!
//! Runs the evaluation job through the scheduler so a manual trigger and a
//! scheduled run can never overlap.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use renewal_scheduler::{SchedulerError, TriggerOutcome};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::{AppState, EVALUATION_JOB};

type ApiError = (StatusCode, Json<Value>);

pub async fn evaluate_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    if !check_auth(&state, &headers) {
        warn!("unauthorized evaluation trigger");
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "unauthorized"})),
        ));
    }

    let outcome = state
        .scheduler
        .trigger_job(EVALUATION_JOB)
        .await
        .map_err(|e| match e {
            SchedulerError::JobNotFound { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": "evaluation job is not registered"})),
            ),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": other.to_string()})),
            ),
        })?;

    match outcome {
        TriggerOutcome::Completed => {
            let Some(report) = state.engine.last_report() else {
                return Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "evaluation produced no report"})),
                ));
            };
            info!(processed = report.processed, sent = report.sent, "manual evaluation done");
            Ok(Json(json!({
                "processed": report.processed,
                "sent": report.sent,
                "skipped": report.skipped,
                "failed": report.failed,
                "duplicates": report.duplicates,
                "unresolved": report.unresolved,
            })))
        }
        TriggerOutcome::Skipped => Err((
            StatusCode::CONFLICT,
            Json(json!({"error": "evaluation already running"})),
        )),
        TriggerOutcome::Failed { error } => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": error})),
        )),
    }
}

/// With no `cron_secret` configured the endpoint is open.
fn check_auth(state: &AppState, headers: &HeaderMap) -> bool {
    match &state.config.server.cron_secret {
        None => true,
        Some(expected) => extract_bearer(headers)
            .map(|t| t == expected)
            .unwrap_or(false),
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
