use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ChannelError;

/// Looks up when a resource name expires.
///
/// `None` covers both "no such resource" and "lookup failed"; callers treat
/// the two alike.
#[async_trait]
pub trait ExpiryResolver: Send + Sync {
    async fn resolve_expiry(&self, name: &str) -> Option<DateTime<Utc>>;
}

#[derive(Deserialize)]
struct ExpiryBody {
    expires_at: Option<DateTime<Utc>>,
}

/// Registry client: `GET {base_url}/{name}` → `{"expires_at": RFC3339 | null}`.
pub struct HttpExpiryResolver {
    client: reqwest::Client,
    base_url: String,
}

impl HttpExpiryResolver {
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self, ChannelError> {
        reqwest::Url::parse(base_url).map_err(|e| {
            ChannelError::ConfigError(format!("invalid resolver url {base_url}: {e}"))
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ChannelError::ConfigError(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, name: &str) -> Result<Option<DateTime<Utc>>, ChannelError> {
        let url = format!("{}/{}", self.base_url, name);
        let resp = self.client.get(&url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(ChannelError::SendFailed(format!(
                "resolver returned {}",
                resp.status()
            )));
        }
        let body: ExpiryBody = resp.json().await?;
        Ok(body.expires_at)
    }
}

#[async_trait]
impl ExpiryResolver for HttpExpiryResolver {
    async fn resolve_expiry(&self, name: &str) -> Option<DateTime<Utc>> {
        match self.fetch(name).await {
            Ok(expiry) => {
                debug!(resource = %name, ?expiry, "expiry resolved");
                expiry
            }
            Err(e) => {
                warn!(resource = %name, error = %e, "expiry lookup failed");
                None
            }
        }
    }
}

/// Fixed name → expiry table. Used when no registry is configured.
#[derive(Debug, Default)]
pub struct StaticExpiryResolver {
    entries: DashMap<String, DateTime<Utc>>,
}

impl StaticExpiryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: &str, expires_at: DateTime<Utc>) -> Self {
        self.set(name, expires_at);
        self
    }

    pub fn set(&self, name: &str, expires_at: DateTime<Utc>) {
        self.entries.insert(name.to_string(), expires_at);
    }

    pub fn remove(&self, name: &str) {
        self.entries.remove(name);
    }
}

#[async_trait]
impl ExpiryResolver for StaticExpiryResolver {
    async fn resolve_expiry(&self, name: &str) -> Option<DateTime<Utc>> {
        self.entries.get(name).map(|e| *e.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn static_resolver_lookup() {
        let at = Utc.with_ymd_and_hms(2027, 3, 1, 0, 0, 0).unwrap();
        let resolver = StaticExpiryResolver::new().with("alice.eth", at);
        assert_eq!(resolver.resolve_expiry("alice.eth").await, Some(at));
        assert_eq!(resolver.resolve_expiry("bob.eth").await, None);

        resolver.remove("alice.eth");
        assert_eq!(resolver.resolve_expiry("alice.eth").await, None);
    }

    #[test]
    fn http_resolver_rejects_bad_base_url() {
        assert!(HttpExpiryResolver::new("::nope::", 1_000).is_err());
    }
}
