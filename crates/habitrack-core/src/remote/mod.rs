//! Remote store collaborator.
//!
//! The managers treat the backend as an opaque CRUD service over three
//! tables. Rows travel as JSON objects and are decoded by the caller.

mod memory;
pub(crate) mod postgrest;

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::RemoteError;

/// Table names on the remote store.
pub mod tables {
    pub const USERS: &str = "users";
    pub const HABITS: &str = "habits";
    pub const HABIT_LOGS: &str = "habit_logs";
}

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOp {
    Eq(String),
    Gte(String),
    In(Vec<String>),
}

/// A single column predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
}

/// Result ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// A select: conjunction of filters plus optional ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<String>) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            op: FilterOp::Eq(value.into()),
        });
        self
    }

    pub fn gte(mut self, column: &str, value: impl Into<String>) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            op: FilterOp::Gte(value.into()),
        });
        self
    }

    pub fn in_list<I, S>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.push(Filter {
            column: column.to_string(),
            op: FilterOp::In(values.into_iter().map(Into::into).collect()),
        });
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            descending: true,
        });
        self
    }
}

/// CRUD operations the managers need from the backend.
///
/// The store owns uniqueness and foreign-key integrity; callers do not
/// re-validate what comes back.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Rows of `table` matching every filter, in the requested order.
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, RemoteError>;

    /// Insert one row and return it as stored (with generated columns).
    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError>;

    /// Apply `patch` to the row with `id` and return the updated row.
    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value, RemoteError>;

    /// Delete the row with `id`.
    async fn delete(&self, table: &str, id: &str) -> Result<(), RemoteError>;
}

/// Decode a list of rows into typed records.
pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, serde_json::Error> {
    rows.into_iter().map(serde_json::from_value).collect()
}

/// Encode a payload as a row or patch.
pub(crate) fn encode_row<T: Serialize>(row: &T) -> Result<Value, serde_json::Error> {
    serde_json::to_value(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_builder_accumulates_filters() {
        let q = Query::new()
            .eq("user_id", "u1")
            .gte("date", "2026-09-16")
            .order_desc("date");
        assert_eq!(q.filters.len(), 2);
        assert_eq!(q.filters[1].op, FilterOp::Gte("2026-09-16".into()));
        assert_eq!(
            q.order,
            Some(Order {
                column: "date".into(),
                descending: true
            })
        );
    }
}
