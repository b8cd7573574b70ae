use async_trait::async_trait;

use crate::{
    error::ChannelError,
    types::{OutboundMessage, SendReceipt},
};

/// Transport that delivers reminders to owners.
///
/// `send` takes `&self` so one adapter can be shared across the concurrent
/// evaluation tasks. An `Ok` means the provider accepted the message; the
/// caller records the delivery only then.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Stable lowercase identifier, used in logs (e.g. `"webhook"`).
    fn name(&self) -> &str;

    async fn send(&self, msg: &OutboundMessage) -> Result<SendReceipt, ChannelError>;
}
