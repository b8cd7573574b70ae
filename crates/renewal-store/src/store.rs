use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::debug;

use crate::db::{Record, TableName};
use crate::error::{Result, StoreError};
use crate::query::{Delete, Patch, Query, Update};
use crate::types::{Conversation, DeliveryRecord, TrackedResource};

/// Rows of one table plus its id sequence.
pub(crate) struct TableState<R> {
    pub(crate) rows: Vec<R>,
    next_id: i64,
}

/// One in-memory table. Every operation holds the table lock for its whole
/// duration, so each call is atomic with respect to the table.
pub struct Table<R> {
    state: Mutex<TableState<R>>,
}

impl<R: Record> Table<R> {
    fn new() -> Self {
        Self {
            state: Mutex::new(TableState {
                rows: Vec::new(),
                next_id: 1,
            }),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, TableState<R>> {
        // A panic mid-operation cannot leave a half-written row: rows are
        // only pushed or swapped in whole.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert_locked(state: &mut TableState<R>, mut row: R) -> R {
        let now = Utc::now();
        row.set_id(state.next_id);
        state.next_id += 1;
        if row.created_at().is_none() {
            row.stamp_created(now);
        }
        state.rows.push(row.clone());
        row
    }

    fn insert(&self, row: R) -> R {
        let mut state = self.lock();
        let row = Self::insert_locked(&mut state, row);
        debug!(table = %R::TABLE, id = row.id(), "row inserted");
        row
    }

    fn insert_unique(&self, row: R, key_columns: &[&str]) -> Result<R> {
        for column in key_columns {
            if !R::has_column(column) {
                return Err(StoreError::UnknownColumn {
                    table: R::TABLE,
                    column: column.to_string(),
                });
            }
        }

        let mut state = self.lock();
        let clash = state.rows.iter().any(|existing| {
            key_columns
                .iter()
                .all(|col| existing.get(col) == row.get(col))
        });
        if clash {
            let key = key_columns
                .iter()
                .map(|col| format!("{col}={:?}", row.get(col).unwrap_or(crate::Value::Null)))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(StoreError::Duplicate {
                table: R::TABLE,
                key,
            });
        }
        let row = Self::insert_locked(&mut state, row);
        debug!(table = %R::TABLE, id = row.id(), "row inserted (unique)");
        Ok(row)
    }

    fn len(&self) -> usize {
        self.lock().rows.len()
    }
}

/// Owns every table. Construct one per process and share it behind an `Arc`.
pub struct Store {
    pub(crate) tracked: Table<TrackedResource>,
    pub(crate) deliveries: Table<DeliveryRecord>,
    pub(crate) conversations: Table<Conversation>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            tracked: Table::new(),
            deliveries: Table::new(),
            conversations: Table::new(),
        }
    }

    /// Assign the next id, stamp `created_at` if unset, store and return the row.
    pub fn insert<R: Record>(&self, row: R) -> Result<R> {
        Ok(R::table(self).insert(row))
    }

    /// Insert unless a row with equal `key_columns` already exists.
    ///
    /// The check and the insert happen under one lock, so two concurrent
    /// callers can never both succeed for the same key.
    pub fn insert_unique<R: Record>(&self, row: R, key_columns: &[&str]) -> Result<R> {
        R::table(self).insert_unique(row, key_columns)
    }

    /// Start a filtered read.
    pub fn select<R: Record>(&self) -> Query<'_, R> {
        Query::new(R::table(self))
    }

    /// Start a patch of every row matching the filters added next.
    pub fn update<R: Record>(&self, patch: Patch) -> Update<'_, R> {
        Update::new(R::table(self), patch)
    }

    /// Start a delete of every row matching the filters added next.
    pub fn delete<R: Record>(&self) -> Delete<'_, R> {
        Delete::new(R::table(self))
    }

    pub fn row_count(&self, table: TableName) -> usize {
        match table {
            TableName::TrackedResources => self.tracked.len(),
            TableName::DeliveryRecords => self.deliveries.len(),
            TableName::Conversations => self.conversations.len(),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
