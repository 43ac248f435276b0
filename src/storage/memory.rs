//! In-memory database with per-thread connections
//!
//! Committed rows live behind one `RwLock`. Every thread gets a connection
//! holding a stack of transaction scopes; the first `begin` opens the
//! transaction and every further `begin` opens a savepoint. Writes made
//! outside any scope autocommit.

use super::StorageError;
use crate::core::transaction::{TransactionBackend, TransactionError};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::thread::{self, ThreadId};
use tracing::{debug, trace};

type Rows = BTreeMap<String, Value>;

/// Pending writes of one scope, keyed by (table, id). `None` is a delete.
type Changes = BTreeMap<(String, String), Option<Value>>;

#[derive(Debug, Default)]
struct Table {
    unique_fields: Vec<String>,
    rows: Rows,
}

#[derive(Debug, Default)]
struct ConnectionState {
    scopes: Vec<Changes>,
    needs_rollback: bool,
}

impl ConnectionState {
    fn is_idle(&self) -> bool {
        self.scopes.is_empty() && !self.needs_rollback
    }
}

/// Shared in-memory database
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    committed: RwLock<HashMap<String, Table>>,
    connections: DashMap<ThreadId, ConnectionState>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table. Non-null values of `unique_fields` must be unique
    /// across the table's rows.
    pub fn create_table(&self, name: &str, unique_fields: &[&str]) {
        let mut tables = self.committed.write();
        tables.entry(name.to_string()).or_insert_with(|| Table {
            unique_fields: unique_fields.iter().map(|f| f.to_string()).collect(),
            rows: Rows::new(),
        });
        debug!(table = name, "Table created");
    }

    /// Insert a new row. The row must be a JSON object; its `id` field is set
    /// to `id`.
    pub fn insert(&self, table: &str, id: &str, row: Value) -> Result<Value, StorageError> {
        let mut row = into_object(row)?;
        row.insert("id".to_string(), Value::String(id.to_string()));
        let row = Value::Object(row);
        self.write(table, id, Some(row.clone()))?;
        Ok(row)
    }

    pub fn get(&self, table: &str, id: &str) -> Result<Value, StorageError> {
        self.visible_rows(table)?
            .remove(id)
            .ok_or_else(|| not_found(table, id))
    }

    /// Merge `patch` into an existing row
    pub fn update(&self, table: &str, id: &str, patch: Map<String, Value>) -> Result<Value, StorageError> {
        let mut row = into_object(self.get(table, id)?)?;
        for (field, value) in patch {
            if field != "id" {
                row.insert(field, value);
            }
        }
        let row = Value::Object(row);
        self.write(table, id, Some(row.clone()))?;
        Ok(row)
    }

    pub fn delete(&self, table: &str, id: &str) -> Result<(), StorageError> {
        self.get(table, id)?;
        self.write(table, id, None)
    }

    /// Every row visible to the calling thread, ordered by id
    pub fn list(&self, table: &str) -> Result<Vec<Value>, StorageError> {
        Ok(self.visible_rows(table)?.into_values().collect())
    }

    pub fn count(&self, table: &str) -> Result<usize, StorageError> {
        Ok(self.visible_rows(table)?.len())
    }

    /// Whether the calling thread has an open transaction
    pub fn in_transaction(&self) -> bool {
        self.connections
            .get(&thread::current().id())
            .is_some_and(|conn| !conn.scopes.is_empty())
    }

    /// Number of threads with an open or poisoned connection
    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }

    fn visible_rows(&self, table: &str) -> Result<Rows, StorageError> {
        let conn = self.connections.get(&thread::current().id());
        if conn.as_ref().is_some_and(|c| c.needs_rollback) {
            return Err(StorageError::TransactionAborted);
        }

        let tables = self.committed.read();
        let mut rows = tables
            .get(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?
            .rows
            .clone();
        if let Some(conn) = conn {
            for scope in &conn.scopes {
                overlay(&mut rows, scope, table);
            }
        }
        Ok(rows)
    }

    fn write(&self, table: &str, id: &str, value: Option<Value>) -> Result<(), StorageError> {
        let tid = thread::current().id();
        let mut conn = self.connections.entry(tid).or_default();
        if conn.needs_rollback {
            return Err(StorageError::TransactionAborted);
        }

        if conn.scopes.is_empty() {
            drop(conn);
            self.connections.remove_if(&tid, |_, c| c.is_idle());

            // Autocommit: check and apply under one write lock
            let mut tables = self.committed.write();
            let target = tables
                .get_mut(table)
                .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;
            if let Some(row) = &value {
                check_unique(table, &target.unique_fields, &target.rows, id, row)?;
            }
            apply(&mut target.rows, id, value);
            trace!(table, id, "Autocommitted write");
            return Ok(());
        }

        let checked = {
            let tables = self.committed.read();
            let target = tables
                .get(table)
                .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;
            match &value {
                Some(row) => {
                    let mut rows = target.rows.clone();
                    for scope in &conn.scopes {
                        overlay(&mut rows, scope, table);
                    }
                    check_unique(table, &target.unique_fields, &rows, id, row)
                }
                None => Ok(()),
            }
        };

        if let Err(e) = checked {
            conn.needs_rollback = true;
            debug!(table, id, error = %e, "Write failed inside a transaction, marked for rollback");
            return Err(e);
        }

        if let Some(top) = conn.scopes.last_mut() {
            top.insert((table.to_string(), id.to_string()), value);
        }
        Ok(())
    }

    fn publish(&self, changes: Changes) {
        let mut tables = self.committed.write();
        for ((table, id), value) in changes {
            if let Some(target) = tables.get_mut(&table) {
                apply(&mut target.rows, &id, value);
            }
        }
    }

    fn forget_if_idle(&self, tid: ThreadId) {
        self.connections.remove_if(&tid, |_, c| c.is_idle());
    }
}

impl TransactionBackend for MemoryDatabase {
    fn begin(&self) -> Result<(), TransactionError> {
        let mut conn = self.connections.entry(thread::current().id()).or_default();
        if conn.needs_rollback {
            return Err(TransactionError::Aborted);
        }
        conn.scopes.push(Changes::new());
        trace!(depth = conn.scopes.len(), "Scope opened");
        Ok(())
    }

    fn commit(&self) -> Result<(), TransactionError> {
        let tid = thread::current().id();
        let outcome = {
            let mut conn = self
                .connections
                .get_mut(&tid)
                .ok_or(TransactionError::NotOpen)?;
            let top = conn.scopes.pop().ok_or(TransactionError::NotOpen)?;

            if conn.needs_rollback {
                // A poisoned scope is discarded; the poison stays until the
                // outermost scope is gone.
                if conn.scopes.is_empty() {
                    conn.needs_rollback = false;
                }
                Err(TransactionError::Aborted)
            } else if let Some(below) = conn.scopes.last_mut() {
                below.extend(top);
                Ok(None)
            } else {
                Ok(Some(top))
            }
        };

        let result = match outcome {
            Ok(Some(changes)) => {
                self.publish(changes);
                debug!("Transaction committed");
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        self.forget_if_idle(tid);
        result
    }

    fn rollback(&self) -> Result<(), TransactionError> {
        let tid = thread::current().id();
        {
            let mut conn = self
                .connections
                .get_mut(&tid)
                .ok_or(TransactionError::NotOpen)?;
            conn.scopes.pop().ok_or(TransactionError::NotOpen)?;
            conn.needs_rollback = false;
            trace!(depth = conn.scopes.len(), "Scope rolled back");
        }
        self.forget_if_idle(tid);
        Ok(())
    }

    fn needs_rollback(&self) -> bool {
        self.connections
            .get(&thread::current().id())
            .is_some_and(|conn| conn.needs_rollback)
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>, StorageError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StorageError::InvalidRow(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

fn not_found(table: &str, id: &str) -> StorageError {
    StorageError::NotFound {
        table: table.to_string(),
        id: id.to_string(),
    }
}

fn overlay(rows: &mut Rows, scope: &Changes, table: &str) {
    for ((t, id), value) in scope {
        if t == table {
            apply(rows, id, value.clone());
        }
    }
}

fn apply(rows: &mut Rows, id: &str, value: Option<Value>) {
    match value {
        Some(row) => {
            rows.insert(id.to_string(), row);
        }
        None => {
            rows.remove(id);
        }
    }
}

fn check_unique(
    table: &str,
    unique_fields: &[String],
    rows: &Rows,
    id: &str,
    row: &Value,
) -> Result<(), StorageError> {
    for field in unique_fields {
        let Some(candidate) = row.get(field).filter(|v| !v.is_null()) else {
            continue;
        };
        let taken = rows
            .iter()
            .any(|(other_id, other)| other_id != id && other.get(field) == Some(candidate));
        if taken {
            return Err(StorageError::UniqueViolation {
                table: table.to_string(),
                field: field.clone(),
            });
        }
    }
    Ok(())
}
