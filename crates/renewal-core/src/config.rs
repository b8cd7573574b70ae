use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::types::{IntervalTag, PostExpiryKey};

pub const DEFAULT_PORT: u16 = 18790;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_TICK_MS: u64 = 1_000;
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
/// Daily at 09:00 UTC.
pub const DEFAULT_EVALUATION_CRON: &str = "0 9 * * *";

/// Top-level config (renewal.toml + RENEWAL_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenewalConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token required by `POST /cron/evaluate`. `None` leaves it open.
    pub cron_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            cron_secret: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// Days-remaining thresholds that trigger a reminder. Each must map onto
    /// an [`IntervalTag`] (30, 7 or 1).
    #[serde(default = "default_intervals")]
    pub intervals_days: Vec<i64>,
    #[serde(default)]
    pub post_expiry_key: PostExpiryKey,
    /// Upper bound on a single gateway send; a timeout counts as a failed send.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    /// How many resources are evaluated at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            intervals_days: default_intervals(),
            post_expiry_key: PostExpiryKey::default(),
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl ReminderConfig {
    /// Resolve configured thresholds to tags, rejecting any that have none.
    pub fn interval_tags(&self) -> crate::Result<Vec<(i64, IntervalTag)>> {
        self.intervals_days
            .iter()
            .map(|&days| {
                IntervalTag::for_threshold(days)
                    .map(|tag| (days, tag))
                    .ok_or_else(|| {
                        crate::RenewalError::Config(format!(
                            "reminders.intervals_days: no interval tag for {days} days \
                             (allowed: 30, 7, 1)"
                        ))
                    })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Poll cadence of the scheduler loop.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Cron expression (5 or 6 fields) for the evaluation job.
    #[serde(default = "default_evaluation_cron")]
    pub evaluation_cron: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            evaluation_cron: DEFAULT_EVALUATION_CRON.to_string(),
        }
    }
}

/// Outbound message transport. With no webhook the gateway only logs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryConfig {
    pub webhook_url: Option<String>,
    /// HMAC-SHA256 key used to sign webhook bodies.
    pub signing_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Registry endpoint; `GET {base_url}/{name}` returns `{"expires_at": ...}`.
    pub base_url: Option<String>,
    #[serde(default = "default_resolver_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_resolver_timeout_ms(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_intervals() -> Vec<i64> {
    vec![30, 7, 1]
}
fn default_send_timeout_ms() -> u64 {
    DEFAULT_SEND_TIMEOUT_MS
}
fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}
fn default_tick_ms() -> u64 {
    DEFAULT_TICK_MS
}
fn default_evaluation_cron() -> String {
    DEFAULT_EVALUATION_CRON.to_string()
}
fn default_resolver_timeout_ms() -> u64 {
    5_000
}

impl RenewalConfig {
    /// Load config from a TOML file with RENEWAL_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.renewal/renewal.toml
    ///
    /// Nested keys use a double underscore: `RENEWAL_SERVER__PORT=9000`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: RenewalConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("RENEWAL_").split("__"))
            .extract()
            .map_err(|e| crate::error::RenewalError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that deserialize fine but cannot be run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        self.reminders.interval_tags()?;
        if self.reminders.max_concurrency == 0 {
            return Err(crate::error::RenewalError::Config(
                "reminders.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.scheduler.tick_ms == 0 {
            return Err(crate::error::RenewalError::Config(
                "scheduler.tick_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.renewal/renewal.toml", home)
}
