//! `renewal-store`: in-memory relational stand-in.
//!
//! Three typed tables (tracked resources, delivery records, conversations)
//! behind a chainable filter/order query builder. Callers written against
//! [`Store`] should port to a real database without logic changes: every
//! operation is atomic per table and errors come back as values.

pub mod db;
pub mod error;
pub mod query;
pub mod store;
pub mod types;

pub use db::{Record, TableName};
pub use error::{Result, StoreError};
pub use query::{Delete, Patch, Query, QueryResult, Update};
pub use store::Store;
pub use types::{Conversation, DeliveryRecord, TrackedResource, Value};
