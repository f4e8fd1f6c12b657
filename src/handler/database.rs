//! Database-backed session handler.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use tracing::warn;

use super::{ExistenceAware, SessionHandler};
use crate::session::SessionId;

/// One row of the session table.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    /// Session id, the primary key.
    pub id: String,
    /// Base64-encoded serialized attribute blob.
    pub payload: String,
    /// Unix timestamp of the last write.
    pub last_activity: i64,
}

/// Narrow interface to the row store holding session records.
///
/// The actual database layer is a collaborator outside this crate; any
/// type that can select, upsert, delete, and purge rows of
/// `(id, payload, last_activity)` can back the handler. [`InMemoryTable`]
/// is the bundled implementation.
pub trait SessionTable: Send {
    /// Look up a record by session id.
    fn find(&self, id: &str) -> Option<SessionRecord>;

    /// Insert a new record. Returns `false` on failure.
    fn insert(&mut self, record: SessionRecord) -> bool;

    /// Update an existing record. Returns `false` on failure.
    fn update(&mut self, record: SessionRecord) -> bool;

    /// Delete a record by session id. Returns `false` on failure.
    fn delete(&mut self, id: &str) -> bool;

    /// Delete records with `last_activity <= cutoff`, returning the count.
    fn purge_older_than(&mut self, cutoff: i64) -> usize;
}

/// Stores sessions as rows in a [`SessionTable`], base64-encoding the
/// payload on write.
///
/// Existence-aware: a read that finds a row flips the `exists` flag so the
/// next write issues an `update` instead of an `insert`. The owning store
/// resets the flag through [`ExistenceAware`] after migrating to a fresh
/// id.
pub struct DatabaseSessionHandler {
    table: Arc<Mutex<dyn SessionTable>>,
    exists: bool,
}

impl DatabaseSessionHandler {
    /// Create a handler over a shared session table.
    pub fn new(table: Arc<Mutex<dyn SessionTable>>) -> Self {
        Self {
            table,
            exists: false,
        }
    }

    /// Whether the current session id is known to have a row.
    pub fn exists(&self) -> bool {
        self.exists
    }
}

impl SessionHandler for DatabaseSessionHandler {
    fn read(&mut self, id: &SessionId) -> String {
        let record = match self.table.lock() {
            Ok(table) => table.find(id.as_str()),
            Err(_) => {
                warn!(session = %id, "session table lock poisoned");
                return String::new();
            }
        };

        let Some(record) = record else {
            return String::new();
        };
        self.exists = true;

        match BASE64.decode(&record.payload) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(session = %id, error = %e, "session payload is not valid UTF-8");
                    String::new()
                }
            },
            Err(e) => {
                warn!(session = %id, error = %e, "session payload is not valid base64");
                String::new()
            }
        }
    }

    fn write(&mut self, id: &SessionId, data: &str) -> bool {
        let record = SessionRecord {
            id: id.as_str().to_string(),
            payload: BASE64.encode(data),
            last_activity: Utc::now().timestamp(),
        };

        let written = match self.table.lock() {
            Ok(mut table) => {
                if self.exists {
                    table.update(record)
                } else {
                    table.insert(record)
                }
            }
            Err(_) => {
                warn!(session = %id, "session table lock poisoned");
                false
            }
        };

        if written {
            self.exists = true;
        }
        written
    }

    fn destroy(&mut self, id: &SessionId) -> bool {
        self.table
            .lock()
            .map(|mut table| table.delete(id.as_str()))
            .unwrap_or(false)
    }

    fn gc(&mut self, max_lifetime_secs: u64) -> usize {
        let cutoff = Utc::now().timestamp() - max_lifetime_secs as i64;
        self.table
            .lock()
            .map(|mut table| table.purge_older_than(cutoff))
            .unwrap_or(0)
    }

    fn as_existence_aware(&mut self) -> Option<&mut dyn ExistenceAware> {
        Some(self)
    }
}

impl ExistenceAware for DatabaseSessionHandler {
    fn set_exists(&mut self, exists: bool) {
        self.exists = exists;
    }
}

/// In-memory [`SessionTable`] for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryTable {
    rows: HashMap<String, SessionRecord>,
}

impl InMemoryTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table behind the shared handle the handler expects.
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True if a row exists for the id.
    pub fn contains(&self, id: &str) -> bool {
        self.rows.contains_key(id)
    }
}

impl SessionTable for InMemoryTable {
    fn find(&self, id: &str) -> Option<SessionRecord> {
        self.rows.get(id).cloned()
    }

    fn insert(&mut self, record: SessionRecord) -> bool {
        self.rows.insert(record.id.clone(), record);
        true
    }

    fn update(&mut self, record: SessionRecord) -> bool {
        match self.rows.get_mut(&record.id) {
            Some(row) => {
                *row = record;
                true
            }
            None => false,
        }
    }

    fn delete(&mut self, id: &str) -> bool {
        self.rows.remove(id).is_some()
    }

    fn purge_older_than(&mut self, cutoff: i64) -> usize {
        let before = self.rows.len();
        self.rows.retain(|_, row| row.last_activity > cutoff);
        before - self.rows.len()
    }
}
