use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use renewal_channels::{LogGateway, StaticExpiryResolver};
use renewal_core::config::RenewalConfig;
use renewal_engine::{CommandService, ReminderEngine};
use renewal_gateway::app::{build_router, register_evaluation_job, AppState, EVALUATION_JOB};
use renewal_scheduler::{JobError, Schedule, Scheduler};
use renewal_store::{Store, TrackedResource};
use serde_json::{json, Value};
use tokio::sync::Notify;
use tower::ServiceExt;

fn state_with(config: RenewalConfig, register_job: bool) -> Arc<AppState> {
    let store = Arc::new(Store::new());
    let engine = Arc::new(
        ReminderEngine::new(
            Arc::clone(&store),
            Arc::new(LogGateway::new()),
            &config.reminders,
        )
        .unwrap(),
    );
    let resolver = Arc::new(
        StaticExpiryResolver::new().with("alice.eth", Utc::now() + chrono::Duration::days(7)),
    );
    let commands = CommandService::new(Arc::clone(&store), resolver);
    let scheduler = Scheduler::new(Duration::from_millis(50));
    if register_job {
        register_evaluation_job(
            &scheduler,
            Arc::clone(&engine),
            Schedule::Interval { every_secs: 86_400 },
        )
        .unwrap();
    }
    Arc::new(AppState::new(config, store, engine, commands, scheduler))
}

fn state() -> Arc<AppState> {
    state_with(RenewalConfig::default(), true)
}

async fn call(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
    let resp = build_router(Arc::clone(state)).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let state = state();
    let (status, body) = call(&state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["jobs"], 1);
    assert_eq!(body["scheduler_running"], false);
}

#[tokio::test]
async fn evaluate_returns_pass_counts() {
    let state = state();
    state
        .store
        .insert(TrackedResource::new(
            "alice.eth",
            "0xA",
            Some(Utc::now() + chrono::Duration::days(7)),
        ))
        .unwrap();
    state
        .store
        .insert(TrackedResource::new("pending.eth", "0xA", None))
        .unwrap();

    let (status, body) = call(&state, post_empty("/cron/evaluate", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"processed": 2, "sent": 1, "skipped": 0, "failed": 0, "duplicates": 0, "unresolved": 1})
    );

    let (_, again) = call(&state, post_empty("/cron/evaluate", None)).await;
    assert_eq!(again["sent"], 0);
    assert_eq!(again["skipped"], 1);
}

#[tokio::test]
async fn evaluate_requires_configured_secret() {
    let mut config = RenewalConfig::default();
    config.server.cron_secret = Some("hunter2".to_string());
    let state = state_with(config, true);

    let (status, _) = call(&state, post_empty("/cron/evaluate", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&state, post_empty("/cron/evaluate", Some("wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&state, post_empty("/cron/evaluate", Some("hunter2"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn evaluate_conflicts_while_running() {
    let state = state();
    let (started, release) = (Arc::new(Notify::new()), Arc::new(Notify::new()));
    {
        let (started, release) = (Arc::clone(&started), Arc::clone(&release));
        state
            .scheduler
            .schedule(EVALUATION_JOB, Schedule::Interval { every_secs: 86_400 }, move || {
                let (started, release) = (Arc::clone(&started), Arc::clone(&release));
                async move {
                    started.notify_one();
                    release.notified().await;
                    Ok::<(), JobError>(())
                }
            })
            .unwrap();
    }

    let running = {
        let scheduler = state.scheduler.clone();
        tokio::spawn(async move { scheduler.trigger_job(EVALUATION_JOB).await })
    };
    started.notified().await;

    let (status, body) = call(&state, post_empty("/cron/evaluate", None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "evaluation already running");

    release.notify_one();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn evaluate_without_job_is_unavailable() {
    let state = state_with(RenewalConfig::default(), false);
    let (status, _) = call(&state, post_empty("/cron/evaluate", None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn command_endpoints_reply_with_text() {
    let state = state();

    let (status, body) = call(
        &state,
        post_json("/commands/track", json!({"name": "alice.eth", "owner": "0xA"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["reply"].as_str().unwrap().starts_with("Now tracking alice.eth"));

    let (_, body) = call(&state, get("/commands/list?owner=0xA")).await;
    assert!(body["reply"].as_str().unwrap().contains("alice.eth"));

    let (_, body) = call(&state, get("/commands/status?name=alice.eth&owner=0xA")).await;
    assert!(body["reply"]
        .as_str()
        .unwrap()
        .contains("expires within a week"));

    let (_, body) = call(
        &state,
        post_json("/commands/untrack", json!({"name": "alice.eth", "owner": "0xA"})),
    )
    .await;
    assert_eq!(body["reply"], "Stopped tracking alice.eth.");
}

#[tokio::test]
async fn command_errors_are_still_replies() {
    let state = state();
    let (status, body) = call(&state, post_json("/commands/track", json!({"name": "alice.eth"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["reply"].as_str().unwrap().contains("owner address"));

    let (_, body) = call(
        &state,
        post_json("/commands/track", json!({"name": "nope.eth", "owner": "0xA"})),
    )
    .await;
    assert!(body["reply"].as_str().unwrap().contains("couldn't find"));
}

#[tokio::test]
async fn admin_table_counts_and_unknown_table() {
    let state = state();
    call(
        &state,
        post_json("/commands/track", json!({"name": "alice.eth", "owner": "0xA"})),
    )
    .await;

    let (status, body) = call(&state, get("/admin/tables/tracked_resources")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"table": "tracked_resources", "rows": 1}));

    let (_, body) = call(&state, get("/admin/tables/conversations")).await;
    assert_eq!(body["rows"], 1);

    let (status, body) = call(&state, get("/admin/tables/reminders")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("reminders"));
}

#[tokio::test]
async fn admin_jobs_lists_evaluation_job() {
    let state = state();
    let (status, body) = call(&state, get("/admin/jobs")).await;
    assert_eq!(status, StatusCode::OK);
    let jobs = body["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["name"], EVALUATION_JOB);
    assert_eq!(jobs[0]["status"], "idle");
    assert_eq!(jobs[0]["schedule"]["kind"], "interval");
}
