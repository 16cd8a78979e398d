//! In-process remote store.
//!
//! Mimics the column defaults of the hosted tables so managers can run
//! against it unchanged. Used by tests and offline demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Local, Utc};
use serde_json::{Map, Value};

use super::{tables, FilterOp, Query, RemoteStore};
use crate::error::RemoteError;

/// Remote store holding rows in memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, AtomicOrdering::SeqCst);
    }

    /// Insert rows as-is, bypassing defaults.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        self.lock().entry(table.to_string()).or_default().extend(rows);
    }

    /// Snapshot of a table in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().get(table).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Value>>> {
        // A poisoned lock only means a test panicked mid-call; the data is intact.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn guard(&self) -> Result<(), RemoteError> {
        if self.failing.load(AtomicOrdering::SeqCst) {
            return Err(RemoteError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn matches(row: &Value, query: &Query) -> bool {
    query.filters.iter().all(|filter| {
        let Some(cell) = row.get(&filter.column) else {
            return false;
        };
        let cell = as_text(cell);
        match &filter.op {
            FilterOp::Eq(v) => &cell == v,
            FilterOp::Gte(v) => cell.as_str() >= v.as_str(),
            FilterOp::In(values) => values.contains(&cell),
        }
    })
}

fn apply_defaults(table: &str, row: &mut Map<String, Value>) {
    row.entry("id")
        .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
    match table {
        tables::HABIT_LOGS => {
            row.entry("date")
                .or_insert_with(|| Value::String(Local::now().date_naive().to_string()));
            row.entry("completed").or_insert(Value::Bool(false));
            row.entry("completed_at").or_insert(Value::Null);
        }
        tables::HABITS => {
            row.entry("emoji").or_insert_with(|| Value::String("⭐".into()));
            row.entry("created_at")
                .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        }
        _ => {
            let now = Value::String(Utc::now().to_rfc3339());
            row.entry("created_at").or_insert_with(|| now.clone());
            row.entry("updated_at").or_insert(now);
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, RemoteError> {
        self.guard()?;
        let data = self.lock();
        let mut rows: Vec<Value> = data
            .get(table)
            .map(|rows| rows.iter().filter(|r| matches(r, query)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = &query.order {
            let key = |r: &Value| r.get(&order.column).map(as_text).unwrap_or_default();
            rows.sort_by(|a, b| key(a).cmp(&key(b)));
            if order.descending {
                // Ties end up newest-inserted first, like a descending timestamp.
                rows.reverse();
            }
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError> {
        self.guard()?;
        let Value::Object(mut map) = row else {
            return Err(RemoteError::Status {
                status: 400,
                message: "row must be a JSON object".into(),
            });
        };
        apply_defaults(table, &mut map);
        let stored = Value::Object(map);
        self.lock()
            .entry(table.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value, RemoteError> {
        self.guard()?;
        let not_found = || RemoteError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        };
        let mut data = self.lock();
        let row = data
            .get_mut(table)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|r| r.get("id").map(as_text).as_deref() == Some(id))
            })
            .ok_or_else(not_found)?;

        if let (Value::Object(target), Value::Object(fields)) = (&mut *row, patch) {
            for (k, v) in fields {
                target.insert(k, v);
            }
            if table == tables::USERS {
                target.insert("updated_at".into(), Value::String(Utc::now().to_rfc3339()));
            }
        }
        Ok(row.clone())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), RemoteError> {
        self.guard()?;
        let mut data = self.lock();
        if let Some(rows) = data.get_mut(table) {
            rows.retain(|r| r.get("id").map(as_text).as_deref() != Some(id));
        }
        // Logs go with their habit.
        if table == tables::HABITS {
            if let Some(logs) = data.get_mut(tables::HABIT_LOGS) {
                logs.retain(|r| r.get("habit_id").map(as_text).as_deref() != Some(id));
            }
        }
        Ok(())
    }
}
