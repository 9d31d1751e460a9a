//! SQLite-backed renewal record store.
//!
//! - WAL mode for durability and concurrent readers
//! - Consumption is a conditional UPDATE, so the compare-and-set holds even
//!   when several processes share one database file
//! - Records are never deleted here; expiry cleanup is out of scope

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use super::CredentialStore;
use crate::error::StoreError;
use crate::model::RenewalRecord;

pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
}

impl SqliteCredentialStore {
    /// Create or open a store at the specified path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        info!(path = %path.display(), "Opening credential store");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS renewal_credentials (
                id TEXT PRIMARY KEY,
                subject_id TEXT NOT NULL,
                secret_hash TEXT NOT NULL,
                bound_address TEXT NOT NULL,
                issued_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                consumed INTEGER NOT NULL DEFAULT 0,
                CHECK (expires_at > issued_at)
            );

            CREATE INDEX IF NOT EXISTS idx_renewal_subject_id ON renewal_credentials(subject_id);
            "#,
        )?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("connection lock poisoned".to_string()))
    }

    /// Execute raw SQL for testing purposes only
    ///
    /// **WARNING**: This bypasses the store's invariants and exists only so tests
    /// can simulate a damaged database.
    #[doc(hidden)]
    pub fn __test_execute_raw_sql(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<usize, StoreError> {
        Ok(self.conn()?.execute(sql, params)?)
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn create(&self, record: &RenewalRecord) -> Result<(), StoreError> {
        let issued_at = to_column(record.issued_at_ms)?;
        let expires_at = to_column(record.expires_at_ms)?;

        let conn = self.conn()?;
        let result = conn.execute(
            r#"
            INSERT INTO renewal_credentials (
                id, subject_id, secret_hash, bound_address,
                issued_at, expires_at, consumed
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                record.id,
                record.subject_id,
                record.secret_hash,
                record.bound_address,
                issued_at,
                expires_at,
                record.consumed,
            ],
        );

        match result {
            Ok(_) => {
                debug!(credential_id = %record.id, "Renewal record created");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation
                    && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                Err(StoreError::Duplicate {
                    id: record.id.clone(),
                })
            }
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    fn fetch_by_id(&self, id: &str) -> Result<Option<RenewalRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, subject_id, secret_hash, bound_address,
                   issued_at, expires_at, consumed
            FROM renewal_credentials
            WHERE id = ?1
            "#,
        )?;

        let record = stmt
            .query_row([id], |row| {
                Ok(RenewalRecord {
                    id: row.get(0)?,
                    subject_id: row.get(1)?,
                    secret_hash: row.get(2)?,
                    bound_address: row.get(3)?,
                    issued_at_ms: row.get(4)?,
                    expires_at_ms: row.get(5)?,
                    consumed: row.get(6)?,
                })
            })
            .optional()?;

        Ok(record)
    }

    fn mark_consumed(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE renewal_credentials SET consumed = 1 WHERE id = ?1 AND consumed = 0",
            [id],
        )?;

        if changed == 1 {
            return Ok(());
        }

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM renewal_credentials WHERE id = ?1)",
            [id],
            |row| row.get(0),
        )?;

        if exists {
            Err(StoreError::AlreadyConsumed { id: id.to_string() })
        } else {
            Err(StoreError::NotFound { id: id.to_string() })
        }
    }
}

/// Timestamps are stored as signed 64-bit integers.
fn to_column(ms: u64) -> Result<i64, StoreError> {
    i64::try_from(ms).map_err(|_| StoreError::Backend(format!("timestamp {ms} exceeds i64")))
}
