use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use futures_util::{
    stream::{self, StreamExt},
    FutureExt,
};
use renewal_channels::{ChannelError, DeliveryGateway, OutboundMessage};
use renewal_core::{
    config::ReminderConfig, days_until, render_reminder, IntervalTag, PostExpiryKey,
};
use renewal_store::{DeliveryRecord, Patch, Store, StoreError, TrackedResource};
use tracing::{debug, error, info, warn};

use crate::{
    error::{EngineError, Result},
    report::{EvaluationReport, ResourceOutcome},
};

type DedupKey = (i64, IntervalTag);

/// Result of attempting one due reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Sent,
    AlreadySent,
    /// Sent, but a concurrent writer had already recorded the key.
    Duplicate,
    Failed,
}

/// Holds a `(resource, key)` slot in the in-flight set until dropped.
struct Claim<'a> {
    set: &'a DashSet<DedupKey>,
    key: DedupKey,
}

impl<'a> Claim<'a> {
    fn acquire(set: &'a DashSet<DedupKey>, key: DedupKey) -> Option<Self> {
        set.insert(key).then(|| Self { set, key })
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}

/// Decides which reminders are due and delivers each one at most once per
/// tracked resource and dedup key.
pub struct ReminderEngine {
    store: Arc<Store>,
    gateway: Arc<dyn DeliveryGateway>,
    thresholds: Vec<(i64, IntervalTag)>,
    post_expiry_key: PostExpiryKey,
    send_timeout: Duration,
    max_concurrency: usize,
    in_flight: DashSet<DedupKey>,
    last_report: Mutex<Option<EvaluationReport>>,
}

impl ReminderEngine {
    pub fn new(
        store: Arc<Store>,
        gateway: Arc<dyn DeliveryGateway>,
        config: &ReminderConfig,
    ) -> Result<Self> {
        let thresholds = config
            .interval_tags()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        if config.max_concurrency == 0 {
            return Err(EngineError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            store,
            gateway,
            thresholds,
            post_expiry_key: config.post_expiry_key,
            send_timeout: Duration::from_millis(config.send_timeout_ms),
            max_concurrency: config.max_concurrency,
            in_flight: DashSet::new(),
            last_report: Mutex::new(None),
        })
    }

    /// Run one pass over every tracked resource as of `now`.
    ///
    /// Per-resource failures are logged and counted, including a panic while
    /// evaluating one resource; only failing to read the resource table
    /// aborts the pass.
    pub async fn evaluate(&self, now: DateTime<Utc>) -> Result<EvaluationReport> {
        let resources = self
            .store
            .select::<TrackedResource>()
            .order("id", true)
            .resolve()
            .into_result()?;

        info!(
            resources = resources.len(),
            gateway = self.gateway.name(),
            "evaluation pass started"
        );

        let outcomes: Vec<ResourceOutcome> = stream::iter(resources)
            .map(|resource| {
                let (id, name) = (resource.id, resource.resource_name.clone());
                AssertUnwindSafe(self.evaluate_resource(resource, now))
                    .catch_unwind()
                    .map(move |result| {
                        result.unwrap_or_else(|_| {
                            error!(resource_id = id, name = %name, "resource evaluation panicked");
                            ResourceOutcome::Panicked
                        })
                    })
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut report = EvaluationReport::new(now);
        for outcome in outcomes {
            report.absorb(outcome);
        }

        info!(
            processed = report.processed,
            sent = report.sent,
            skipped = report.skipped,
            failed = report.failed,
            duplicates = report.duplicates,
            unresolved = report.unresolved,
            "evaluation pass finished"
        );
        *self
            .last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
        Ok(report)
    }

    /// Report of the most recent completed pass.
    pub fn last_report(&self) -> Option<EvaluationReport> {
        self.last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Interval tags due for a resource with `days` remaining.
    ///
    /// A threshold is due only on the exact day it names; the post-expiry
    /// notice is due on every day from expiry onwards and relies on dedup to
    /// go out once.
    pub fn due_intervals(&self, days: i64) -> Vec<IntervalTag> {
        let mut due: Vec<IntervalTag> = self
            .thresholds
            .iter()
            .filter(|(threshold, _)| *threshold == days)
            .map(|(_, tag)| *tag)
            .collect();
        if days <= 0 {
            due.push(IntervalTag::PostExpiry);
        }
        due
    }

    async fn evaluate_resource(
        &self,
        resource: TrackedResource,
        now: DateTime<Utc>,
    ) -> ResourceOutcome {
        let Some(expires_at) = resource.expires_at else {
            debug!(resource_id = resource.id, name = %resource.resource_name, "expiry unresolved; skipping");
            return ResourceOutcome::Unresolved;
        };

        let days = days_until(expires_at, now);
        let (mut sent, mut skipped, mut failed, mut duplicates) = (0, 0, 0, 0);
        for tag in self.due_intervals(days) {
            match self.deliver(&resource, tag, days, now).await {
                Delivery::Sent => sent += 1,
                Delivery::AlreadySent => skipped += 1,
                Delivery::Duplicate => duplicates += 1,
                Delivery::Failed => failed += 1,
            }
        }
        ResourceOutcome::Evaluated {
            sent,
            skipped,
            failed,
            duplicates,
        }
    }

    /// Check, send, record. Nothing is written unless the gateway accepted
    /// the message.
    async fn deliver(
        &self,
        resource: &TrackedResource,
        tag: IntervalTag,
        days: i64,
        now: DateTime<Utc>,
    ) -> Delivery {
        let key = self.post_expiry_key.dedup_key(tag);
        let Some(_claim) = Claim::acquire(&self.in_flight, (resource.id, key)) else {
            debug!(resource_id = resource.id, interval = %key, "delivery in flight elsewhere");
            return Delivery::AlreadySent;
        };

        let prior = self
            .store
            .select::<DeliveryRecord>()
            .eq("resource_id", resource.id)
            .eq("interval", key)
            .limit(1)
            .resolve();
        match prior.into_result() {
            Ok(rows) if !rows.is_empty() => {
                debug!(resource_id = resource.id, interval = %key, "already delivered");
                return Delivery::AlreadySent;
            }
            Ok(_) => {}
            Err(e) => {
                error!(resource_id = resource.id, interval = %key, error = %e, "delivery lookup failed");
                return Delivery::Failed;
            }
        }

        let msg = OutboundMessage {
            recipient: resource.owner_address.clone(),
            resource_name: resource.resource_name.clone(),
            interval: tag,
            content: render_reminder(&resource.resource_name, days),
        };

        let sent = match tokio::time::timeout(self.send_timeout, self.gateway.send(&msg)).await {
            Ok(result) => result,
            Err(_) => Err(ChannelError::Timeout {
                ms: self.send_timeout.as_millis() as u64,
            }),
        };
        let receipt = match sent {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(resource_id = resource.id, interval = %tag, error = %e, "reminder send failed");
                return Delivery::Failed;
            }
        };

        let record = DeliveryRecord::new(resource, key, now, receipt.message_id);
        match self
            .store
            .insert_unique(record, &["resource_id", "interval"])
        {
            Ok(_) => {}
            Err(StoreError::Duplicate { .. }) => {
                // Another writer recorded the same key after our lookup, so the
                // owner has now received this reminder twice.
                error!(
                    resource_id = resource.id,
                    interval = %key,
                    "duplicate reminder sent; key already recorded by a concurrent writer"
                );
                return Delivery::Duplicate;
            }
            Err(e) => {
                error!(resource_id = resource.id, interval = %key, error = %e, "sent reminder could not be recorded");
                return Delivery::Failed;
            }
        }

        self.refresh_notified(resource.id, key);
        info!(
            resource_id = resource.id,
            name = %resource.resource_name,
            interval = %tag,
            days_remaining = days,
            "reminder delivered"
        );
        Delivery::Sent
    }

    /// Append `key` to the resource's `notified` cache.
    fn refresh_notified(&self, resource_id: i64, key: IntervalTag) {
        let current = self
            .store
            .select::<TrackedResource>()
            .eq("id", resource_id)
            .resolve()
            .into_result();
        let Some(row) = current.ok().and_then(|rows| rows.into_iter().next()) else {
            return;
        };
        if row.notified.iter().any(|t| t == key.as_str()) {
            return;
        }
        let mut notified = row.notified;
        notified.push(key.as_str().to_string());
        if let Err(e) = self
            .store
            .update::<TrackedResource>(Patch::new().set("notified", notified))
            .eq("id", resource_id)
            .execute()
        {
            warn!(resource_id, error = %e, "notified cache not updated");
        }
    }
}
