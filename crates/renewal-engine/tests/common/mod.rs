//! Test doubles shared by the engine integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use renewal_channels::{ChannelError, DeliveryGateway, OutboundMessage, SendReceipt};
use renewal_core::config::ReminderConfig;
use renewal_engine::ReminderEngine;
use renewal_store::Store;

/// Records every accepted message; can be told to fail, panic or stall.
#[derive(Default)]
pub struct FakeGateway {
    pub sent: Mutex<Vec<OutboundMessage>>,
    pub attempts: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    delay_ms: AtomicU64,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, resource_name: &str) {
        self.failing.lock().unwrap().insert(resource_name.to_string());
    }

    pub fn panic_for(&self, resource_name: &str) {
        self.panicking
            .lock()
            .unwrap()
            .insert(resource_name.to_string());
    }

    pub fn recover(&self) {
        self.failing.lock().unwrap().clear();
        self.panicking.lock().unwrap().clear();
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryGateway for FakeGateway {
    fn name(&self) -> &str {
        "fake"
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<SendReceipt, ChannelError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let panics = self.panicking.lock().unwrap().contains(&msg.resource_name);
        if panics {
            panic!("gateway crashed on {}", msg.resource_name);
        }
        if self.failing.lock().unwrap().contains(&msg.resource_name) {
            return Err(ChannelError::SendFailed("provider rejected".to_string()));
        }
        self.sent.lock().unwrap().push(msg.clone());
        Ok(SendReceipt {
            message_id: Some(format!("fake-{n}")),
        })
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
}

/// An engine over an existing store and gateway.
pub fn engine_on(store: &Arc<Store>, gateway: &Arc<FakeGateway>) -> ReminderEngine {
    ReminderEngine::new(
        Arc::clone(store),
        Arc::clone(gateway) as Arc<dyn DeliveryGateway>,
        &ReminderConfig::default(),
    )
    .unwrap()
}

pub fn engine_with(
    config: ReminderConfig,
) -> (Arc<Store>, Arc<FakeGateway>, ReminderEngine) {
    let store = Arc::new(Store::new());
    let gateway = FakeGateway::new();
    let engine = ReminderEngine::new(
        Arc::clone(&store),
        Arc::clone(&gateway) as Arc<dyn DeliveryGateway>,
        &config,
    )
    .unwrap();
    (store, gateway, engine)
}

pub fn engine() -> (Arc<Store>, Arc<FakeGateway>, ReminderEngine) {
    engine_with(ReminderConfig::default())
}
