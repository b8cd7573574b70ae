use renewal_core::IntervalTag;
use serde::{Deserialize, Serialize};

/// One reminder addressed to a resource owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Owner address the reminder goes to.
    pub recipient: String,

    pub resource_name: String,

    /// Which reminder this is; lets receivers dedupe on their side too.
    pub interval: IntervalTag,

    /// Plain-text body.
    pub content: String,
}

/// Acknowledgement from a gateway after a successful send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Provider-assigned id, when the provider returns one.
    pub message_id: Option<String>,
}
