//! Outbound delivery and expiry lookup.
//!
//! The reminder engine only sees the [`DeliveryGateway`] and
//! [`ExpiryResolver`] traits; the adapters here are what the service binary
//! wires in.

pub mod error;
pub mod gateway;
pub mod log;
pub mod resolver;
pub mod types;
pub mod webhook;

pub use error::ChannelError;
pub use gateway::DeliveryGateway;
pub use log::LogGateway;
pub use resolver::{ExpiryResolver, HttpExpiryResolver, StaticExpiryResolver};
pub use types::{OutboundMessage, SendReceipt};
pub use webhook::{sign_payload, WebhookGateway, SIGNATURE_HEADER};
