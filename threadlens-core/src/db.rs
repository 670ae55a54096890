//! SQLite-backed [`ReferenceStore`].
//!
//! Pass `":memory:"` for a store that lives exactly as long as the process
//! (session scope); pass a file path to keep references across runs.

use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension};

use crate::cache::ReferenceStore;
use crate::error::StoreError;
use crate::types::{ConversationIdentity, ReferenceKind};

/// Path that selects an in-memory database.
pub const IN_MEMORY: &str = ":memory:";

pub struct SqliteReferenceStore {
    conn: Mutex<Connection>,
}

impl SqliteReferenceStore {
    /// Opens (or creates) the store at `path` and applies schema migrations.
    ///
    /// File-backed stores run in WAL mode; `busy_timeout` is set via the
    /// `Connection` method so it takes effect regardless of pragma caching.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` if the file cannot be opened or the DDL fails.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let mut conn = Connection::open(path)?;
        if path != IN_MEMORY {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;",
            )?;
        }
        conn.busy_timeout(Duration::from_secs(5))?;
        crate::schema::migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(IN_MEMORY)
    }

    /// Loads the stored URL for `identity` and `kind`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` if the query fails.
    pub fn load(
        &self,
        identity: &ConversationIdentity,
        kind: ReferenceKind,
    ) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let url = conn
            .query_row(
                "SELECT url FROM reference_cache
                 WHERE owner = ?1 AND repo = ?2 AND thread_id = ?3 AND kind = ?4",
                rusqlite::params![
                    &identity.owner,
                    &identity.repo,
                    &identity.thread_id,
                    kind.as_str()
                ],
                |r| r.get(0),
            )
            .optional()?;
        Ok(url)
    }

    /// Upserts the URL for `identity` and `kind` inside `BEGIN IMMEDIATE`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` if the write transaction fails.
    pub fn save(
        &self,
        identity: &ConversationIdentity,
        kind: ReferenceKind,
        url: &str,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO reference_cache (owner, repo, thread_id, kind, url, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(owner, repo, thread_id, kind)
             DO UPDATE SET url = excluded.url,
                           updated_at = excluded.updated_at",
            rusqlite::params![
                &identity.owner,
                &identity.repo,
                &identity.thread_id,
                kind.as_str(),
                url,
                now_secs()
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Deletes the record for `identity` and `kind`. Missing rows are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` if the delete fails.
    pub fn delete(
        &self,
        identity: &ConversationIdentity,
        kind: ReferenceKind,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "DELETE FROM reference_cache
             WHERE owner = ?1 AND repo = ?2 AND thread_id = ?3 AND kind = ?4",
            rusqlite::params![
                &identity.owner,
                &identity.repo,
                &identity.thread_id,
                kind.as_str()
            ],
        )?;
        Ok(())
    }

    /// Returns the number of records stored for `identity`, across kinds.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` if the query fails.
    pub fn count_for(&self, identity: &ConversationIdentity) -> Result<i64, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM reference_cache
             WHERE owner = ?1 AND repo = ?2 AND thread_id = ?3",
            rusqlite::params![&identity.owner, &identity.repo, &identity.thread_id],
            |r| r.get(0),
        )?;
        Ok(count)
    }
}

impl ReferenceStore for SqliteReferenceStore {
    fn get(&self, identity: &ConversationIdentity, kind: ReferenceKind) -> Option<String> {
        self.load(identity, kind).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "reference store read failed");
            None
        })
    }

    fn set(&self, identity: &ConversationIdentity, kind: ReferenceKind, url: &str) {
        if let Err(err) = self.save(identity, kind, url) {
            tracing::warn!(error = %err, "reference store write failed");
        }
    }

    fn remove(&self, identity: &ConversationIdentity, kind: ReferenceKind) {
        if let Err(err) = self.delete(identity, kind) {
            tracing::warn!(error = %err, "reference store delete failed");
        }
    }
}

/// Returns the current Unix timestamp in seconds.
fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
