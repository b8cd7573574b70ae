use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use renewal_channels::{
    DeliveryGateway, ExpiryResolver, HttpExpiryResolver, LogGateway, StaticExpiryResolver,
    WebhookGateway,
};
use renewal_core::config::{DeliveryConfig, RenewalConfig, ResolverConfig};
use renewal_engine::{CommandService, ReminderEngine};
use renewal_gateway::app::{self, AppState};
use renewal_scheduler::{Schedule, Scheduler};
use renewal_store::Store;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "renewal-gateway", version, about = "Expiry reminder service")]
struct Cli {
    /// Path to renewal.toml (falls back to RENEWAL_CONFIG, then ~/.renewal/renewal.toml).
    #[arg(long, short)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "renewal_gateway=info,renewal_engine=info,renewal_scheduler=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    // load config: --config > RENEWAL_CONFIG env > ~/.renewal/renewal.toml
    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| std::env::var("RENEWAL_CONFIG").ok());
    let config = RenewalConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        RenewalConfig::default()
    });

    let store = Arc::new(Store::new());
    let gateway = build_gateway(&config.delivery)?;
    let resolver = build_resolver(&config.resolver)?;

    let engine = Arc::new(ReminderEngine::new(
        Arc::clone(&store),
        gateway,
        &config.reminders,
    )?);
    let commands = CommandService::new(Arc::clone(&store), resolver);

    let scheduler = Scheduler::new(Duration::from_millis(config.scheduler.tick_ms));
    let schedule = Schedule::parse(&config.scheduler.evaluation_cron)?;
    let job = app::register_evaluation_job(&scheduler, Arc::clone(&engine), schedule)?;
    info!(job = %job.name, next_run = ?job.next_run, "evaluation job registered");
    scheduler.start()?;

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let state = Arc::new(AppState::new(
        config,
        store,
        engine,
        commands,
        scheduler.clone(),
    ));
    let router = app::build_router(state);

    info!("Renewal gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    info!("Renewal gateway stopped");
    Ok(())
}

/// Webhook delivery when a URL is configured, log-only otherwise.
fn build_gateway(cfg: &DeliveryConfig) -> anyhow::Result<Arc<dyn DeliveryGateway>> {
    match &cfg.webhook_url {
        Some(url) => {
            info!(url = %url, signed = cfg.signing_secret.is_some(), "webhook delivery enabled");
            Ok(Arc::new(WebhookGateway::new(url, cfg.signing_secret.clone())?))
        }
        None => {
            warn!("no delivery.webhook_url configured; reminders will only be logged");
            Ok(Arc::new(LogGateway::new()))
        }
    }
}

fn build_resolver(cfg: &ResolverConfig) -> anyhow::Result<Arc<dyn ExpiryResolver>> {
    match &cfg.base_url {
        Some(url) => Ok(Arc::new(HttpExpiryResolver::new(url, cfg.timeout_ms)?)),
        None => {
            warn!("no resolver.base_url configured; every lookup will come back not found");
            Ok(Arc::new(StaticExpiryResolver::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
