//! Signed JSON webhook delivery.
//!
//! Each reminder is POSTed as the JSON form of [`OutboundMessage`]. With a
//! signing secret configured the raw body is signed with HMAC-SHA256 and the
//! digest sent as `X-Renewal-Signature: sha256=<hex>`, the same scheme GitHub
//! uses for `X-Hub-Signature-256`.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::{
    error::ChannelError,
    gateway::DeliveryGateway,
    types::{OutboundMessage, SendReceipt},
};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Renewal-Signature";

/// `sha256=<hex digest>` of `body` keyed by `secret`.
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String, ChannelError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ChannelError::ConfigError(format!("bad signing secret: {e}")))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Optional acknowledgement body returned by the receiving endpoint.
#[derive(Deserialize)]
struct WebhookAck {
    message_id: Option<String>,
}

pub struct WebhookGateway {
    client: reqwest::Client,
    url: reqwest::Url,
    signing_secret: Option<String>,
}

impl WebhookGateway {
    pub fn new(url: &str, signing_secret: Option<String>) -> Result<Self, ChannelError> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| ChannelError::ConfigError(format!("invalid webhook url {url}: {e}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            url,
            signing_secret,
        })
    }
}

#[async_trait]
impl DeliveryGateway for WebhookGateway {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<SendReceipt, ChannelError> {
        let body = serde_json::to_vec(msg)
            .map_err(|e| ChannelError::SendFailed(format!("serialize: {e}")))?;

        let mut builder = self
            .client
            .post(self.url.clone())
            .header("content-type", "application/json");
        if let Some(secret) = &self.signing_secret {
            builder = builder.header(SIGNATURE_HEADER, sign_payload(secret, &body)?);
        }

        debug!(recipient = %msg.recipient, interval = %msg.interval, "posting reminder webhook");
        let resp = builder.body(body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %text, "webhook rejected reminder");
            return Err(ChannelError::SendFailed(format!(
                "webhook returned {status}: {text}"
            )));
        }

        // Receivers are not required to answer with a body.
        let message_id = resp
            .json::<WebhookAck>()
            .await
            .ok()
            .and_then(|ack| ack.message_id);
        Ok(SendReceipt { message_id })
    }
}
