//! Table set and typed row schemas.
//!
//! The set of tables is closed: rows name their table at compile time, so a
//! typo in a table name can only happen at the string boundary
//! ([`TableName::from_str`]).

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{Result, StoreError};
use crate::store::{Store, Table};
use crate::types::{Conversation, DeliveryRecord, TrackedResource, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableName {
    TrackedResources,
    DeliveryRecords,
    Conversations,
}

impl TableName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::TrackedResources => "tracked_resources",
            TableName::DeliveryRecords => "delivery_records",
            TableName::Conversations => "conversations",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TableName {
    type Err = StoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "tracked_resources" => Ok(TableName::TrackedResources),
            "delivery_records" => Ok(TableName::DeliveryRecords),
            "conversations" => Ok(TableName::Conversations),
            other => Err(StoreError::UnknownTable(other.to_string())),
        }
    }
}

/// A row type bound to exactly one table.
///
/// `get`/`set` expose the row column-by-column so the query builder can
/// filter, order and patch without knowing the concrete type.
pub trait Record: Clone + Send + Sync + 'static {
    const TABLE: TableName;
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    fn created_at(&self) -> Option<DateTime<Utc>>;
    fn stamp_created(&mut self, at: DateTime<Utc>);
    fn stamp_updated(&mut self, at: DateTime<Utc>);

    /// Column value, or `None` for a column this table does not have.
    fn get(&self, column: &str) -> Option<Value>;

    /// Overwrite one column. `id` is read-only.
    fn set(&mut self, column: &str, value: Value) -> Result<()>;

    /// The table holding rows of this type.
    fn table(store: &Store) -> &Table<Self>;

    fn has_column(column: &str) -> bool {
        Self::COLUMNS.contains(&column)
    }
}

impl Record for TrackedResource {
    const TABLE: TableName = TableName::TrackedResources;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "resource_name",
        "owner_address",
        "expires_at",
        "notified",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
    fn stamp_created(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }
    fn stamp_updated(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }

    fn get(&self, column: &str) -> Option<Value> {
        Some(match column {
            "id" => Value::Int(self.id),
            "resource_name" => Value::from(&self.resource_name),
            "owner_address" => Value::from(&self.owner_address),
            "expires_at" => Value::from(self.expires_at),
            "notified" => Value::List(self.notified.clone()),
            "created_at" => Value::from(self.created_at),
            "updated_at" => Value::from(self.updated_at),
            _ => return None,
        })
    }

    fn set(&mut self, column: &str, value: Value) -> Result<()> {
        let col = Column::new(Self::TABLE, column);
        match column {
            "resource_name" => self.resource_name = col.text(value)?,
            "owner_address" => self.owner_address = col.text(value)?,
            "expires_at" => self.expires_at = col.opt_time(value)?,
            "notified" => self.notified = col.list(value)?,
            "created_at" => self.created_at = col.opt_time(value)?,
            "updated_at" => self.updated_at = col.opt_time(value)?,
            _ => return Err(col.not_writable()),
        }
        Ok(())
    }

    fn table(store: &Store) -> &Table<Self> {
        &store.tracked
    }
}

impl Record for DeliveryRecord {
    const TABLE: TableName = TableName::DeliveryRecords;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "resource_id",
        "resource_name",
        "owner_address",
        "interval",
        "sent_at",
        "message_id",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
    fn stamp_created(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }
    fn stamp_updated(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }

    fn get(&self, column: &str) -> Option<Value> {
        Some(match column {
            "id" => Value::Int(self.id),
            "resource_id" => Value::Int(self.resource_id),
            "resource_name" => Value::from(&self.resource_name),
            "owner_address" => Value::from(&self.owner_address),
            "interval" => Value::from(self.interval),
            "sent_at" => Value::Time(self.sent_at),
            "message_id" => Value::from(self.message_id.clone()),
            "created_at" => Value::from(self.created_at),
            "updated_at" => Value::from(self.updated_at),
            _ => return None,
        })
    }

    fn set(&mut self, column: &str, value: Value) -> Result<()> {
        let col = Column::new(Self::TABLE, column);
        match column {
            "resource_id" => self.resource_id = col.int(value)?,
            "resource_name" => self.resource_name = col.text(value)?,
            "owner_address" => self.owner_address = col.text(value)?,
            "interval" => {
                self.interval = col
                    .text(value)?
                    .parse()
                    .map_err(|_| col.mismatch("interval tag"))?
            }
            "sent_at" => self.sent_at = col.time(value)?,
            "message_id" => self.message_id = col.opt_text(value)?,
            "created_at" => self.created_at = col.opt_time(value)?,
            "updated_at" => self.updated_at = col.opt_time(value)?,
            _ => return Err(col.not_writable()),
        }
        Ok(())
    }

    fn table(store: &Store) -> &Table<Self> {
        &store.deliveries
    }
}

impl Record for Conversation {
    const TABLE: TableName = TableName::Conversations;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "owner_address",
        "last_command",
        "command_count",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
    fn stamp_created(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }
    fn stamp_updated(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }

    fn get(&self, column: &str) -> Option<Value> {
        Some(match column {
            "id" => Value::Int(self.id),
            "owner_address" => Value::from(&self.owner_address),
            "last_command" => Value::from(&self.last_command),
            "command_count" => Value::Int(self.command_count),
            "created_at" => Value::from(self.created_at),
            "updated_at" => Value::from(self.updated_at),
            _ => return None,
        })
    }

    fn set(&mut self, column: &str, value: Value) -> Result<()> {
        let col = Column::new(Self::TABLE, column);
        match column {
            "owner_address" => self.owner_address = col.text(value)?,
            "last_command" => self.last_command = col.text(value)?,
            "command_count" => self.command_count = col.int(value)?,
            "created_at" => self.created_at = col.opt_time(value)?,
            "updated_at" => self.updated_at = col.opt_time(value)?,
            _ => return Err(col.not_writable()),
        }
        Ok(())
    }

    fn table(store: &Store) -> &Table<Self> {
        &store.conversations
    }
}

/// Column context for typed conversions out of [`Value`].
struct Column<'a> {
    table: TableName,
    name: &'a str,
}

impl<'a> Column<'a> {
    fn new(table: TableName, name: &'a str) -> Self {
        Self { table, name }
    }

    fn mismatch(&self, expected: &'static str) -> StoreError {
        StoreError::TypeMismatch {
            table: self.table,
            column: self.name.to_string(),
            expected,
        }
    }

    fn not_writable(&self) -> StoreError {
        if self.name == "id" {
            StoreError::ReadOnlyColumn {
                table: self.table,
                column: self.name.to_string(),
            }
        } else {
            StoreError::UnknownColumn {
                table: self.table,
                column: self.name.to_string(),
            }
        }
    }

    fn text(&self, value: Value) -> Result<String> {
        match value {
            Value::Text(s) => Ok(s),
            _ => Err(self.mismatch("text")),
        }
    }

    fn opt_text(&self, value: Value) -> Result<Option<String>> {
        match value {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s)),
            _ => Err(self.mismatch("text or null")),
        }
    }

    fn int(&self, value: Value) -> Result<i64> {
        match value {
            Value::Int(n) => Ok(n),
            _ => Err(self.mismatch("integer")),
        }
    }

    fn time(&self, value: Value) -> Result<DateTime<Utc>> {
        match value {
            Value::Time(t) => Ok(t),
            _ => Err(self.mismatch("timestamp")),
        }
    }

    fn opt_time(&self, value: Value) -> Result<Option<DateTime<Utc>>> {
        match value {
            Value::Null => Ok(None),
            Value::Time(t) => Ok(Some(t)),
            _ => Err(self.mismatch("timestamp or null")),
        }
    }

    fn list(&self, value: Value) -> Result<Vec<String>> {
        match value {
            Value::List(items) => Ok(items),
            _ => Err(self.mismatch("list")),
        }
    }
}
