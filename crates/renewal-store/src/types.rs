use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use renewal_core::IntervalTag;
use serde::{Deserialize, Serialize};

/// A single column value as seen by filters and patches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
    Time(DateTime<Utc>),
    List(Vec<String>),
}

impl Value {
    /// Ordering between two values of the same scalar type.
    ///
    /// `None` for `Null` on either side, for lists, and for mismatched types,
    /// so range filters never match them.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::List(v)
    }
}

impl From<IntervalTag> for Value {
    fn from(v: IntervalTag) -> Self {
        Value::Text(v.as_str().to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One owner's interest in one resource's expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedResource {
    /// Store-assigned, monotonically increasing within the table.
    pub id: i64,
    pub resource_name: String,
    pub owner_address: String,
    /// `None` until the registry lookup resolves.
    pub expires_at: Option<DateTime<Utc>>,
    /// Denormalized cache of delivered interval tags. Delivery records are
    /// the source of truth.
    pub notified: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TrackedResource {
    pub fn new(
        resource_name: impl Into<String>,
        owner_address: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: 0,
            resource_name: resource_name.into(),
            owner_address: owner_address.into(),
            expires_at,
            notified: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

/// Evidence that one interval notification went out for one tracked resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: i64,
    /// `TrackedResource::id` this delivery belongs to.
    pub resource_id: i64,
    pub resource_name: String,
    pub owner_address: String,
    pub interval: IntervalTag,
    pub sent_at: DateTime<Utc>,
    /// Transport-assigned message identifier, when the gateway returns one.
    pub message_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DeliveryRecord {
    pub fn new(
        resource: &TrackedResource,
        interval: IntervalTag,
        sent_at: DateTime<Utc>,
        message_id: Option<String>,
    ) -> Self {
        Self {
            id: 0,
            resource_id: resource.id,
            resource_name: resource.resource_name.clone(),
            owner_address: resource.owner_address.clone(),
            interval,
            sent_at,
            message_id,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Per-owner conversation metadata, upserted on every command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub owner_address: String,
    pub last_command: String,
    pub command_count: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn new(owner_address: impl Into<String>, last_command: impl Into<String>) -> Self {
        Self {
            id: 0,
            owner_address: owner_address.into(),
            last_command: last_command.into(),
            command_count: 1,
            created_at: None,
            updated_at: None,
        }
    }
}
