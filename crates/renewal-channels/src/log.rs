use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::ChannelError,
    gateway::DeliveryGateway,
    types::{OutboundMessage, SendReceipt},
};

/// Writes reminders to the log instead of sending them. Always succeeds.
#[derive(Debug, Default, Clone)]
pub struct LogGateway;

impl LogGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DeliveryGateway for LogGateway {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<SendReceipt, ChannelError> {
        let message_id = Uuid::now_v7().to_string();
        info!(
            %message_id,
            recipient = %msg.recipient,
            resource = %msg.resource_name,
            interval = %msg.interval,
            content = %msg.content,
            "reminder (log delivery)"
        );
        Ok(SendReceipt {
            message_id: Some(message_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renewal_core::IntervalTag;

    #[tokio::test]
    async fn log_gateway_assigns_message_ids() {
        let gw = LogGateway::new();
        let msg = OutboundMessage {
            recipient: "0xA".to_string(),
            resource_name: "alice.eth".to_string(),
            interval: IntervalTag::SevenDay,
            content: "hello".to_string(),
        };
        let a = gw.send(&msg).await.unwrap();
        let b = gw.send(&msg).await.unwrap();
        assert!(a.message_id.is_some());
        assert_ne!(a.message_id, b.message_id);
        assert_eq!(gw.name(), "log");
    }
}
