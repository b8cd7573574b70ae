use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::Utc;
use renewal_core::config::RenewalConfig;
use renewal_engine::{CommandService, ReminderEngine};
use renewal_scheduler::{JobError, JobInfo, Schedule, Scheduler};
use renewal_store::Store;

/// Name of the scheduler job that runs the evaluation pass.
pub const EVALUATION_JOB: &str = "evaluate-reminders";

/// Central shared state, passed as `Arc<AppState>` to all Axum handlers.
pub struct AppState {
    pub config: RenewalConfig,
    pub store: Arc<Store>,
    pub engine: Arc<ReminderEngine>,
    pub commands: CommandService,
    pub scheduler: Scheduler,
}

impl AppState {
    pub fn new(
        config: RenewalConfig,
        store: Arc<Store>,
        engine: Arc<ReminderEngine>,
        commands: CommandService,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            config,
            store,
            engine,
            commands,
            scheduler,
        }
    }
}

/// Register the evaluation pass with the scheduler under [`EVALUATION_JOB`].
pub fn register_evaluation_job(
    scheduler: &Scheduler,
    engine: Arc<ReminderEngine>,
    schedule: Schedule,
) -> renewal_scheduler::Result<JobInfo> {
    scheduler.schedule(EVALUATION_JOB, schedule, move || {
        let engine = Arc::clone(&engine);
        async move {
            engine
                .evaluate(Utc::now())
                .await
                .map(|_| ())
                .map_err(JobError::from)
        }
    })
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/cron/evaluate", post(crate::http::cron::evaluate_handler))
        .route("/commands/track", post(crate::http::commands::track_handler))
        .route(
            "/commands/untrack",
            post(crate::http::commands::untrack_handler),
        )
        .route("/commands/list", get(crate::http::commands::list_handler))
        .route("/commands/status", get(crate::http::commands::status_handler))
        .route(
            "/admin/tables/{table}",
            get(crate::http::admin::table_handler),
        )
        .route("/admin/jobs", get(crate::http::admin::jobs_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
