//! Chainable query builders.
//!
//! A builder only accumulates an immutable filter set; nothing touches the
//! table until the terminal call (`resolve` / `execute`).

use std::cmp::Ordering;

use chrono::Utc;
use tracing::debug;

use crate::db::Record;
use crate::error::{Result, StoreError};
use crate::store::Table;
use crate::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone)]
struct Filter {
    column: String,
    op: Op,
    value: Value,
}

impl Filter {
    fn matches(&self, actual: &Value) -> bool {
        match self.op {
            Op::Eq => actual == &self.value,
            Op::Neq => actual != &self.value,
            Op::Lt => actual.compare(&self.value) == Some(Ordering::Less),
            Op::Lte => matches!(
                actual.compare(&self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Op::Gt => actual.compare(&self.value) == Some(Ordering::Greater),
            Op::Gte => matches!(
                actual.compare(&self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

/// Conjunctive filter set shared by reads and mutations.
#[derive(Debug, Clone, Default)]
struct Filters(Vec<Filter>);

impl Filters {
    fn push(&mut self, column: &str, op: Op, value: Value) {
        self.0.push(Filter {
            column: column.to_string(),
            op,
            value,
        });
    }

    fn validate<R: Record>(&self) -> Result<()> {
        match self.0.iter().find(|f| !R::has_column(&f.column)) {
            Some(f) => Err(StoreError::UnknownColumn {
                table: R::TABLE,
                column: f.column.clone(),
            }),
            None => Ok(()),
        }
    }

    fn matches<R: Record>(&self, row: &R) -> bool {
        self.0.iter().all(|f| {
            row.get(&f.column)
                .map(|actual| f.matches(&actual))
                .unwrap_or(false)
        })
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Rows plus an error slot. A failed query returns empty `data` and `Some(error)`.
#[derive(Debug, Clone)]
pub struct QueryResult<R> {
    pub data: Vec<R>,
    pub error: Option<StoreError>,
}

impl<R> QueryResult<R> {
    fn ok(data: Vec<R>) -> Self {
        Self { data, error: None }
    }

    fn err(error: StoreError) -> Self {
        Self {
            data: Vec::new(),
            error: Some(error),
        }
    }

    /// Collapse into a `Result` for `?`-style callers.
    pub fn into_result(self) -> Result<Vec<R>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.data),
        }
    }
}

/// Read builder returned by [`Store::select`](crate::Store::select).
pub struct Query<'a, R> {
    table: &'a Table<R>,
    filters: Filters,
    order: Option<(String, bool)>,
    limit: Option<usize>,
}

impl<'a, R: Record> Query<'a, R> {
    pub(crate) fn new(table: &'a Table<R>) -> Self {
        Self {
            table,
            filters: Filters::default(),
            order: None,
            limit: None,
        }
    }

    fn with(mut self, column: &str, op: Op, value: impl Into<Value>) -> Self {
        self.filters.push(column, op, value.into());
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, Op::Eq, value)
    }

    pub fn neq(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, Op::Neq, value)
    }

    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, Op::Lt, value)
    }

    pub fn lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, Op::Lte, value)
    }

    pub fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, Op::Gt, value)
    }

    pub fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, Op::Gte, value)
    }

    /// Sort by `column`. Rows whose value cannot be compared (nulls,
    /// mismatched types) sort last in either direction.
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some((column.to_string(), ascending));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Run the scan: filter, then order, then limit.
    pub fn resolve(self) -> QueryResult<R> {
        if let Err(e) = self.filters.validate::<R>() {
            return QueryResult::err(e);
        }
        if let Some((column, _)) = &self.order {
            if !R::has_column(column) {
                return QueryResult::err(StoreError::UnknownColumn {
                    table: R::TABLE,
                    column: column.clone(),
                });
            }
        }

        let mut rows: Vec<R> = {
            let state = self.table.lock();
            state
                .rows
                .iter()
                .filter(|row| self.filters.matches(*row))
                .cloned()
                .collect()
        };

        if let Some((column, ascending)) = &self.order {
            rows.sort_by(|a, b| {
                let (va, vb) = (a.get(column), b.get(column));
                match (va, vb) {
                    (Some(va), Some(vb)) => match va.compare(&vb) {
                        Some(ord) if *ascending => ord,
                        Some(ord) => ord.reverse(),
                        None => match (va.is_null(), vb.is_null()) {
                            (true, false) => Ordering::Greater,
                            (false, true) => Ordering::Less,
                            _ => Ordering::Equal,
                        },
                    },
                    _ => Ordering::Equal,
                }
            });
        }

        if let Some(n) = self.limit {
            rows.truncate(n);
        }

        debug!(table = %R::TABLE, rows = rows.len(), "query resolved");
        QueryResult::ok(rows)
    }
}

/// Column assignments applied by [`Update`].
#[derive(Debug, Clone, Default)]
pub struct Patch(Vec<(String, Value)>);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.0.push((column.to_string(), value.into()));
        self
    }
}

/// Patch builder returned by [`Store::update`](crate::Store::update).
pub struct Update<'a, R> {
    table: &'a Table<R>,
    patch: Patch,
    filters: Filters,
}

impl<'a, R: Record> Update<'a, R> {
    pub(crate) fn new(table: &'a Table<R>, patch: Patch) -> Self {
        Self {
            table,
            patch,
            filters: Filters::default(),
        }
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(column, Op::Eq, value.into());
        self
    }

    /// Apply the patch to every matching row and stamp `updated_at`.
    ///
    /// All-or-nothing: if the patch fails on any row no row is changed.
    /// Returns the number of rows updated.
    pub fn execute(self) -> Result<usize> {
        if self.filters.is_empty() {
            return Err(StoreError::UnfilteredMutation { table: R::TABLE });
        }
        self.filters.validate::<R>()?;

        let now = Utc::now();
        let mut state = self.table.lock();
        let mut patched = Vec::new();
        for (idx, row) in state.rows.iter().enumerate() {
            if !self.filters.matches(row) {
                continue;
            }
            let mut next = row.clone();
            for (column, value) in &self.patch.0 {
                next.set(column, value.clone())?;
            }
            next.stamp_updated(now);
            patched.push((idx, next));
        }

        let count = patched.len();
        for (idx, row) in patched {
            state.rows[idx] = row;
        }
        debug!(table = %R::TABLE, count, "rows updated");
        Ok(count)
    }
}

/// Delete builder returned by [`Store::delete`](crate::Store::delete).
pub struct Delete<'a, R> {
    table: &'a Table<R>,
    filters: Filters,
}

impl<'a, R: Record> Delete<'a, R> {
    pub(crate) fn new(table: &'a Table<R>) -> Self {
        Self {
            table,
            filters: Filters::default(),
        }
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(column, Op::Eq, value.into());
        self
    }

    /// Remove every matching row; returns how many were removed.
    pub fn execute(self) -> Result<usize> {
        if self.filters.is_empty() {
            return Err(StoreError::UnfilteredMutation { table: R::TABLE });
        }
        self.filters.validate::<R>()?;

        let mut state = self.table.lock();
        let before = state.rows.len();
        state.rows.retain(|row| !self.filters.matches(row));
        let count = before - state.rows.len();
        debug!(table = %R::TABLE, count, "rows deleted");
        Ok(count)
    }
}
